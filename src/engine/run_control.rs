// ==========================================
// 组织架构管理系统 - 运行控制块
// ==========================================
// 职责: 单次运行的进度/状态/取消标志
// 说明: 调用方轮询快照,不打断运行;
//       取消只在块边界与实体类型边界被检查
// ==========================================

use crate::domain::transfer::RunProgress;
use crate::domain::types::{RunKind, RunPhase};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct RunControl {
    run_id: String,
    kind: RunKind,
    phase: Mutex<RunPhase>,
    processed: AtomicUsize,
    total: AtomicUsize,
    cancelled: AtomicBool,
    finished: AtomicBool,
}

impl RunControl {
    pub fn new(run_id: impl Into<String>, kind: RunKind) -> Self {
        Self {
            run_id: run_id.into(),
            kind,
            phase: Mutex::new(RunPhase::Started),
            processed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    pub fn set_phase(&self, phase: RunPhase) {
        if let Ok(mut guard) = self.phase.lock() {
            *guard = phase;
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
            .lock()
            .map(|guard| *guard)
            .unwrap_or(RunPhase::Started)
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn add_processed(&self, n: usize) {
        self.processed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// 请求取消(下一个块/类型边界生效)
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// 进度快照
    pub fn snapshot(&self) -> RunProgress {
        RunProgress {
            run_id: self.run_id.clone(),
            kind: self.kind,
            phase: self.phase().to_string(),
            processed: self.processed(),
            total: self.total.load(Ordering::Relaxed),
            cancelled: self.is_cancelled(),
            finished: self.is_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::EntityType;

    #[test]
    fn test_snapshot_reflects_state() {
        let control = RunControl::new("run-1", RunKind::Import);
        control.set_total(10);
        control.add_processed(3);
        control.set_phase(RunPhase::Processing(EntityType::Unit));

        let snapshot = control.snapshot();
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.total, 10);
        assert_eq!(snapshot.phase, "PROCESSING[UNIT]");
        assert!(!snapshot.finished);

        control.cancel();
        control.mark_finished();
        let snapshot = control.snapshot();
        assert!(snapshot.cancelled && snapshot.finished);
    }
}
