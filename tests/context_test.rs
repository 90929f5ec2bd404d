#[cfg(test)]
mod tests {
    use promises::context::{on_cancel, with_cancel, CancelToken};
    use promises::{Error, Resolver};
    use std::{thread, time::Duration};

    #[test]
    fn test_on_cancel() {
        let token = CancelToken::new();
        let promise = on_cancel::<i32>(&token);
        thread::sleep(Duration::from_millis(10));
        assert!(!promise.is_settled());

        token.cancel();
        assert_eq!(promise.wait(), Err(Error::Canceled));
    }

    #[test]
    fn test_on_cancel_already_canceled() {
        let token = CancelToken::new();
        token.cancel();
        let promise = on_cancel::<i32>(&token);
        assert!(promise.is_settled());
        assert_eq!(promise.wait(), Err(Error::Canceled));
    }

    #[test]
    fn test_on_cancel_custom_reason() {
        let token = CancelToken::new();
        let reason = Error::msg("deadline");
        token.cancel_with(reason.clone());
        assert_eq!(on_cancel::<()>(&token).wait(), Err(reason));
    }

    #[test]
    fn test_on_cancel_custom_reason_after_call() {
        let token = CancelToken::new();
        let promise = on_cancel::<i32>(&token);
        let reason = Error::msg("shutdown");
        thread::sleep(Duration::from_millis(10));
        assert!(!promise.is_settled());

        token.cancel_with(reason.clone());
        assert_eq!(promise.wait(), Err(reason));
    }

    #[test]
    fn test_with_cancel_custom_reason_after_call() {
        let token = CancelToken::new();
        let (_resolver, pending) = Resolver::<i32>::new();
        let promise = with_cancel(&token, pending);
        let reason = Error::msg("deadline");
        let canceler = token.clone();
        let firing = reason.clone();
        let task = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            canceler.cancel_with(firing)
        });
        assert_eq!(promise.wait(), Err(reason));
        assert!(task.join().expect("The canceler thread has panicked"));
    }

    #[test]
    fn test_with_cancel_resolve() {
        let token = CancelToken::new();
        let (resolver, promise) = Resolver::new();
        let promise = with_cancel(&token, promise);
        resolver.resolve(42);
        assert_eq!(promise.wait(), Ok(42));
        token.cancel();
        assert_eq!(promise.wait(), Ok(42));
    }

    #[test]
    fn test_with_cancel_cancel() {
        let token = CancelToken::new();
        let (resolver, promise) = Resolver::<i32>::new();
        let promise = with_cancel(&token, promise);
        token.cancel();
        assert_eq!(promise.wait(), Err(Error::Canceled));
        resolver.resolve(42);
        assert_eq!(promise.wait(), Err(Error::Canceled));
    }
}
