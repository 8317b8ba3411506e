#![allow(dead_code)]

use async_trait::async_trait;
use image_batch_analyzer::error::AnalysisError;
use image_batch_analyzer::models::{Batch, ImageItem};
use image_batch_analyzer::services::{AnalysisBackend, AnalysisRequest};
use image_batch_analyzer::orchestrator::{ProgressSink, SchedulerEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const INSTRUCTION: &str = "You are an imaging assistant. Analyze each image carefully and \
report findings with clear recommendations.";

/// 脚本化的单次响应
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail(AnalysisError),
    /// 永不返回
    Hang,
}

/// 按批次脚本返回结果的后端，同时记录并发情况
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// 为某个批次排好依次返回的结果，用完后回到默认回复
    pub fn script(self, batch_id: &str, steps: Vec<Script>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(batch_id.to_string(), steps.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

pub fn default_reply(batch_id: &str) -> String {
    format!(
        "DETAILED FINDINGS: findings for {batch_id}\n\
         RECOMMENDATIONS: follow up on {batch_id}\n\
         CONFIDENCE: High\n\
         TECHNICAL NOTES: good quality"
    )
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.batch_id)
            .and_then(VecDeque::pop_front);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Some(Script::Reply(text)) => Ok(text),
            Some(Script::Fail(e)) => Err(e),
            Some(Script::Hang) => std::future::pending().await,
            None => Ok(default_reply(&request.batch_id)),
        }
    }
}

/// 记录所有调度事件
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<image_batch_analyzer::models::RunStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SchedulerEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn started_ids(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SchedulerEvent::BatchStarted { batch_id, .. } => Some(batch_id),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: SchedulerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn image(i: usize) -> ImageItem {
    ImageItem::validate(format!("scan-{i:03}.png"), vec![0x89, 0x50, 0x4e, 0x47], 1024).unwrap()
}

pub fn images(count: usize) -> Vec<Arc<ImageItem>> {
    (0..count).map(|i| Arc::new(image(i))).collect()
}

pub fn batch(id: &str, size: usize) -> Batch {
    Batch::new(id, images(size))
}
