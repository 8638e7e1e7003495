use embedded_hal::blocking::delay::DelayMs;

#[derive(Debug)]
pub(crate) struct TimedOut;

/// Polls `cond` until it holds.
///
/// With `interval_ms == 0` and no timeout this is a tight spin. Otherwise we
/// sleep between polls (for at least a millisecond, so that the elapsed time
/// can be counted) and give up once `timeout_ms` have passed.
pub(crate) fn wait_until<D: DelayMs<u32>>(
    delay: &mut D,
    interval_ms: u32,
    timeout_ms: Option<u32>,
    mut cond: impl FnMut() -> bool,
) -> Result<(), TimedOut> {
    if interval_ms == 0 && timeout_ms.is_none() {
        while !cond() {
            core::hint::spin_loop();
        }
        return Ok(());
    }

    let step = interval_ms.max(1);
    let mut waited: u32 = 0;
    while !cond() {
        if timeout_ms.is_some_and(|limit| waited >= limit) {
            return Err(TimedOut);
        }
        delay.delay_ms(step);
        waited = waited.saturating_add(step);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u32,
        calls: u32,
    }

    impl DelayMs<u32> for CountingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
            self.calls += 1;
        }
    }

    #[test]
    fn spin_never_sleeps() {
        let mut delay = CountingDelay::default();
        let mut polls = 0;
        wait_until(&mut delay, 0, None, || {
            polls += 1;
            polls == 5
        })
        .unwrap();
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn paced_polls_sleep_between_checks() {
        let mut delay = CountingDelay::default();
        let mut polls = 0;
        wait_until(&mut delay, 1000, None, || {
            polls += 1;
            polls == 3
        })
        .unwrap();
        assert_eq!(delay.total_ms, 2000);
    }

    #[test]
    fn gives_up_after_timeout() {
        let mut delay = CountingDelay::default();
        assert!(wait_until(&mut delay, 0, Some(25), || false).is_err());
        assert_eq!(delay.total_ms, 25);
    }
}
