use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::catalog::Catalog;
use crate::error::{InventoryError, Result};
use crate::models::{Product, StockStatus};

pub const INTERVAL_CHOICES: [u32; 5] = [15, 30, 60, 120, 240];
const NAMED_PRODUCTS: usize = 3;
const WEEKLY_TOLERANCE_SECS: i64 = 60;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AlertSchedule {
    Interval {
        minutes: u32,
    },
    Weekly {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
}

impl Default for AlertSchedule {
    fn default() -> Self {
        AlertSchedule::Interval { minutes: 60 }
    }
}

impl AlertSchedule {
    pub fn validate(&self) -> Result<()> {
        match *self {
            AlertSchedule::Interval { minutes } if !INTERVAL_CHOICES.contains(&minutes) => {
                Err(InventoryError::Validation(format!(
                    "check interval must be one of {INTERVAL_CHOICES:?} minutes, got {minutes}"
                )))
            }
            AlertSchedule::Weekly { hour, minute, .. } if hour > 23 || minute > 59 => Err(
                InventoryError::Validation(format!("invalid weekly time {hour:02}:{minute:02}")),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    OutOfStock,
    LowStock,
}

impl AlertKind {
    pub fn tag(&self) -> &'static str {
        match self {
            AlertKind::OutOfStock => "out-of-stock",
            AlertKind::LowStock => "low-stock",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StockAlert {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    pub tag: String,
    pub count: usize,
    pub products: Vec<String>,
}

/// Which alert kinds the user wants delivered.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct AlertKinds {
    pub out_of_stock: bool,
    pub low_stock: bool,
}

impl Default for AlertKinds {
    fn default() -> Self {
        Self {
            out_of_stock: true,
            low_stock: true,
        }
    }
}

impl AlertKinds {
    pub fn allows(&self, kind: AlertKind) -> bool {
        match kind {
            AlertKind::OutOfStock => self.out_of_stock,
            AlertKind::LowStock => self.low_stock,
        }
    }
}

fn build_alert(kind: AlertKind, matching: &[&Product]) -> StockAlert {
    let count = matching.len();
    let products: Vec<String> = matching
        .iter()
        .take(NAMED_PRODUCTS)
        .map(|p| p.display_name())
        .collect();
    let mut names = products.join(", ");
    if count > NAMED_PRODUCTS {
        names.push_str("...");
    }
    let noun = if count == 1 { "product" } else { "products" };

    let (title, state) = match kind {
        AlertKind::OutOfStock => ("Products out of stock", "out of stock"),
        AlertKind::LowStock => ("Low stock detected", "low on stock"),
    };

    StockAlert {
        kind,
        title: title.to_string(),
        body: format!("{count} {noun} {state}: {names}"),
        tag: kind.tag().to_string(),
        count,
        products,
    }
}

pub fn evaluate(products: &[Product]) -> Vec<StockAlert> {
    let out: Vec<&Product> = products
        .iter()
        .filter(|p| p.stock_status() == StockStatus::Out)
        .collect();
    let low: Vec<&Product> = products
        .iter()
        .filter(|p| p.stock_status() == StockStatus::Low)
        .collect();

    let mut alerts = Vec::new();
    if !out.is_empty() {
        alerts.push(build_alert(AlertKind::OutOfStock, &out));
    }
    if !low.is_empty() {
        alerts.push(build_alert(AlertKind::LowStock, &low));
    }
    alerts
}

/// Delivery seam. Implementations show the alert however the platform does.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: &StockAlert);
}

/// Fires at most once per day when the clock is within a minute of the
/// configured weekday and time.
#[derive(Debug, Clone)]
pub struct WeeklyTrigger {
    weekday: Weekday,
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
}

impl WeeklyTrigger {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Result<Self> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            InventoryError::Validation(format!("invalid weekly time {hour:02}:{minute:02}"))
        })?;
        Ok(Self {
            weekday,
            at,
            last_fired: None,
        })
    }

    pub fn poll(&mut self, now: NaiveDateTime) -> bool {
        let today = now.date();
        if now.weekday() != self.weekday || self.last_fired == Some(today) {
            return false;
        }
        let offset = (now - today.and_time(self.at)).num_seconds().abs();
        if offset <= WEEKLY_TOLERANCE_SECS {
            self.last_fired = Some(today);
            return true;
        }
        false
    }
}

pub struct AlertScheduler {
    catalog: Catalog,
    schedule: AlertSchedule,
    kinds: AlertKinds,
    sink: Arc<dyn AlertSink>,
}

impl AlertScheduler {
    pub fn new(
        catalog: Catalog,
        schedule: AlertSchedule,
        kinds: AlertKinds,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        schedule.validate()?;
        Ok(Self {
            catalog,
            schedule,
            kinds,
            sink,
        })
    }

    /// Evaluate the current snapshot once and deliver enabled alerts.
    pub fn check_now(&self) -> usize {
        let alerts: Vec<StockAlert> = evaluate(&self.catalog.list())
            .into_iter()
            .filter(|a| self.kinds.allows(a.kind))
            .collect();
        for alert in &alerts {
            tracing::info!(tag = %alert.tag, count = alert.count, "stock alert");
            self.sink.deliver(alert);
        }
        alerts.len()
    }

    /// Runs until the task is aborted. Interval mode checks immediately,
    /// then every N minutes.
    pub async fn run(self) -> Result<()> {
        tracing::info!(schedule = ?self.schedule, "stock alert scheduler started");
        match self.schedule {
            AlertSchedule::Interval { minutes } => {
                let mut ticker = tokio::time::interval(Duration::from_secs(u64::from(minutes) * 60));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    self.check_now();
                }
            }
            AlertSchedule::Weekly {
                weekday,
                hour,
                minute,
            } => {
                let mut trigger = WeeklyTrigger::new(weekday, hour, minute)?;
                let mut ticker = tokio::time::interval(Duration::from_secs(60));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if trigger.poll(chrono::Local::now().naive_local()) {
                        self.check_now();
                    }
                }
            }
        }
    }

    /// Spawn on the current tokio runtime.
    pub fn spawn(self) -> AlertHandle {
        self.spawn_with(|task| {
            tokio::spawn(task);
        })
    }

    /// Hand the scheduler loop to an executor. The loop ends when the
    /// returned handle is stopped or dropped.
    pub fn spawn_with(self, spawn: impl FnOnce(SchedulerTask)) -> AlertHandle {
        let (stop, stopped) = oneshot::channel::<()>();
        spawn(Box::pin(async move {
            tokio::select! {
                biased;
                _ = stopped => tracing::info!("stock alert scheduler stopped"),
                res = self.run() => {
                    if let Err(e) = res {
                        tracing::error!(error = %e, "stock alert scheduler stopped");
                    }
                }
            }
        }));
        AlertHandle { stop: Some(stop) }
    }
}

pub type SchedulerTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Owning handle for a running scheduler. Dropping it stops the task.
#[derive(Debug)]
pub struct AlertHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl AlertHandle {
    pub fn stop(mut self) {
        self.stop.take();
    }

    pub fn is_running(&self) -> bool {
        self.stop.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Unit};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<StockAlert>>);

    impl AlertSink for Collect {
        fn deliver(&self, alert: &StockAlert) {
            self.0.lock().unwrap().push(alert.clone());
        }
    }

    fn product(id: i64, name: &str, stock: f64) -> Product {
        Product {
            id,
            name: name.to_string(),
            brand: None,
            category: Category::Beer,
            stock,
            low_stock_threshold: 5.0,
            unit: Unit::Unit,
            sale_price: 0.0,
            purchase_price: 0.0,
            provider_id: None,
            barcode: None,
            sku: None,
            upc: None,
            important: false,
            notes: String::new(),
            previous_stock: 0.0,
            version: 1,
            created_by: String::new(),
            updated_by: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_evaluate_one_alert_per_partition() {
        let products: Vec<Product> = [0.0, 2.0, 6.0, 0.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, s)| product(i as i64, &format!("Beer {i}"), *s))
            .collect();

        let alerts = evaluate(&products);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, AlertKind::OutOfStock);
        assert_eq!(alerts[0].count, 2);
        assert_eq!(alerts[0].body, "2 products out of stock: Beer 0, Beer 3");
        assert_eq!(alerts[1].kind, AlertKind::LowStock);
        assert_eq!(alerts[1].count, 1);
        assert_eq!(alerts[1].tag, "low-stock");
    }

    #[test]
    fn test_evaluate_names_at_most_three() {
        let products: Vec<Product> = (0..5).map(|i| product(i, &format!("P{i}"), 0.0)).collect();
        let alerts = evaluate(&products);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].products.len(), 3);
        assert!(alerts[0].body.ends_with("P0, P1, P2..."));
    }

    #[test]
    fn test_evaluate_healthy_catalog_is_silent() {
        assert!(evaluate(&[product(1, "Stout", 40.0)]).is_empty());
    }

    #[test]
    fn test_schedule_validation() {
        assert!(AlertSchedule::Interval { minutes: 30 }.validate().is_ok());
        assert!(AlertSchedule::Interval { minutes: 45 }.validate().is_err());
        let weekly = AlertSchedule::Weekly { weekday: Weekday::Mon, hour: 24, minute: 0 };
        assert!(weekly.validate().is_err());
    }

    #[test]
    fn test_weekly_trigger_tolerance_and_once_per_day() {
        let mut trigger = WeeklyTrigger::new(Weekday::Fri, 18, 30).unwrap();
        // 2026-10-16 is a Friday
        let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let at = |h, m, s| friday.and_hms_opt(h, m, s).unwrap();

        assert!(!trigger.poll(at(18, 28, 30)));
        assert!(trigger.poll(at(18, 29, 10)));
        assert!(!trigger.poll(at(18, 30, 10)));

        let mut trigger = WeeklyTrigger::new(Weekday::Fri, 18, 30).unwrap();
        assert!(trigger.poll(at(18, 31, 0)));

        let mut trigger = WeeklyTrigger::new(Weekday::Thu, 18, 30).unwrap();
        assert!(!trigger.poll(at(18, 30, 0)));
    }

    #[test]
    fn test_disabled_kind_is_not_delivered() {
        let sink = Arc::new(Collect::default());
        let catalog = Catalog::from_products(vec![product(1, "Lager", 0.0), product(2, "IPA", 1.0)]);
        let scheduler = AlertScheduler::new(
            catalog,
            AlertSchedule::default(),
            AlertKinds { out_of_stock: true, low_stock: false },
            sink.clone(),
        )
        .unwrap();

        assert_eq!(scheduler.check_now(), 1);
        assert_eq!(sink.0.lock().unwrap()[0].kind, AlertKind::OutOfStock);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_custom_executor_task() {
        let sink = Arc::new(Collect::default());
        let catalog = Catalog::from_products(vec![product(1, "Lager", 0.0)]);
        let spawned = Arc::new(Mutex::new(0));
        let counter = spawned.clone();

        let handle = AlertScheduler::new(
            catalog,
            AlertSchedule::Interval { minutes: 30 },
            AlertKinds::default(),
            sink.clone(),
        )
        .unwrap()
        .spawn_with(move |task| {
            *counter.lock().unwrap() += 1;
            tokio::spawn(task);
        });

        tokio::time::sleep(Duration::from_secs(45 * 60)).await;
        assert_eq!(*spawned.lock().unwrap(), 1);
        assert_eq!(sink.0.lock().unwrap().len(), 2);
        assert!(handle.is_running());

        drop(handle);
        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_finished_task() {
        let sink = Arc::new(Collect::default());
        let handle = AlertScheduler::new(
            Catalog::from_products(Vec::new()),
            AlertSchedule::default(),
            AlertKinds::default(),
            sink,
        )
        .unwrap()
        // An executor that never runs the task drops it right away.
        .spawn_with(drop);

        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_scheduler_repeats_until_stopped() {
        let sink = Arc::new(Collect::default());
        let catalog = Catalog::from_products(vec![product(1, "Lager", 0.0), product(2, "IPA", 1.0)]);
        let handle = AlertScheduler::new(
            catalog,
            AlertSchedule::Interval { minutes: 15 },
            AlertKinds::default(),
            sink.clone(),
        )
        .unwrap()
        .spawn();

        tokio::time::sleep(Duration::from_secs(31 * 60)).await;
        // Checks at 0, 15 and 30 minutes, two alerts each.
        assert_eq!(sink.0.lock().unwrap().len(), 6);
        assert!(handle.is_running());

        handle.stop();
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(sink.0.lock().unwrap().len(), 6);
    }
}
