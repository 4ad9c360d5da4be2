use crate::error::{Error, Result};
use crate::types::Page;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

/// What a handler made of one item.
#[derive(Debug)]
pub enum Outcome<R> {
    Success(R),
    Skip,
    /// Pause, then hand the same item to the handler again.
    RetryAfter(Duration),
    Fatal(Error),
}

impl<R> Outcome<R> {
    /// Rate limits become `RetryAfter` for the time left until reset; anything else is fatal.
    pub fn from_error(err: Error, now: DateTime<Utc>) -> Self {
        match err {
            Error::RateLimited { reset_at } => Outcome::RetryAfter(wait_until(reset_at, now)),
            other => Outcome::Fatal(other),
        }
    }
}

/// Time to wait from `now` until `reset_at`; zero if the reset already passed.
pub fn wait_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset_at - now).to_std().unwrap_or(Duration::ZERO)
}

/// Source of wall-clock time and of the process-wide pause.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// A paged listing, addressed by 1-based page number.
pub trait PageSource<T> {
    fn fetch_page(&mut self, page: u32, per_page: u32) -> impl Future<Output = Result<Page<T>>>;
}

impl<T, F, Fut> PageSource<T> for F
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    fn fetch_page(&mut self, page: u32, per_page: u32) -> impl Future<Output = Result<Page<T>>> {
        (self)(page, per_page)
    }
}

pub trait ItemHandler<T> {
    type Output;
    fn handle(&mut self, item: &T) -> impl Future<Output = Outcome<Self::Output>>;
}

/// Closure-backed [`ItemHandler`] for handlers that never await; see [`handler_fn`].
pub struct FnHandler<F, R> {
    f: F,
    _output: PhantomData<fn() -> R>,
}

pub fn handler_fn<T, R, F>(f: F) -> FnHandler<F, R>
where
    F: FnMut(&T) -> Outcome<R>,
{
    FnHandler {
        f,
        _output: PhantomData,
    }
}

impl<T, R, F> ItemHandler<T> for FnHandler<F, R>
where
    F: FnMut(&T) -> Outcome<R>,
{
    type Output = R;

    async fn handle(&mut self, item: &T) -> Outcome<R> {
        (self.f)(item)
    }
}

/// Next page to request; a cursor that does not move forward ends the walk.
fn advance(current: u32, next: Option<u32>) -> Option<u32> {
    match next {
        Some(n) if n <= current => {
            warn!("next page {} does not follow page {}; stopping", n, current);
            None
        }
        other => other,
    }
}

pub async fn fetch_all<T, S, H, C>(
    source: &mut S,
    per_page: u32,
    handler: &mut H,
    clock: &C,
) -> Result<Vec<H::Output>>
where
    S: PageSource<T>,
    H: ItemHandler<T>,
    C: Clock,
{
    let mut results = Vec::new();
    let mut page_no: u32 = 1;
    loop {
        let page = match source.fetch_page(page_no, per_page).await {
            Ok(page) => page,
            Err(Error::RateLimited { reset_at }) => {
                let wait = wait_until(reset_at, clock.now());
                info!("rate limited on page {}; sleeping {:?}", page_no, wait);
                clock.sleep(wait).await;
                continue;
            }
            Err(e) => return Err(e),
        };
        info!(
            "page {} items={} remaining={}",
            page_no,
            page.items.len(),
            page.rate
                .remaining
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".into())
        );

        let mut idx = 0;
        while idx < page.items.len() {
            match handler.handle(&page.items[idx]).await {
                Outcome::Success(r) => {
                    results.push(r);
                    idx += 1;
                }
                Outcome::Skip => idx += 1,
                Outcome::RetryAfter(wait) => {
                    info!("item {} of page {} throttled; sleeping {:?}", idx, page_no, wait);
                    clock.sleep(wait).await;
                }
                Outcome::Fatal(e) => return Err(e),
            }
        }

        let Some(next) = advance(page_no, page.next_page) else {
            debug!("listing exhausted after page {}", page_no);
            break;
        };
        if page.rate.is_exhausted() {
            if let Some(reset_at) = page.rate.reset_at {
                let wait = wait_until(reset_at, clock.now());
                info!("quota exhausted; sleeping {:?} before page {}", wait, next);
                clock.sleep(wait).await;
            }
        }
        page_no = next;
    }
    Ok(results)
}

/// Gather every item of a listing without pausing; the first error, rate limits included, is
/// returned unchanged so the caller can decide how to retry.
pub async fn collect_pages<T, S>(source: &mut S, per_page: u32) -> Result<Vec<T>>
where
    S: PageSource<T>,
{
    let mut items = Vec::new();
    let mut page_no: u32 = 1;
    loop {
        let page = source.fetch_page(page_no, per_page).await?;
        items.extend(page.items);
        match advance(page_no, page.next_page) {
            Some(next) => page_no = next,
            None => return Ok(items),
        }
    }
}
