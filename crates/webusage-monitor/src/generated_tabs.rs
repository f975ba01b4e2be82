//! 오케스트레이터 생성 탭 레지스트리.
//!
//! 자동화용으로 연 탭은 사용자 활동 스트림에서 제외해야 한다.
//! 생성 직후 등록하고, 닫을 때 해제한다.

use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::debug;
use webusage_core::models::host::TabId;

/// 프로세스 전역 생성 탭 집합
#[derive(Debug, Default)]
pub struct GeneratedTabRegistry {
    tabs: RwLock<HashSet<TabId>>,
}

impl GeneratedTabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 탭 등록
    pub fn register(&self, tab_id: TabId) {
        self.tabs.write().insert(tab_id);
        debug!("생성 탭 등록: {tab_id}");
    }

    /// 탭 해제. 등록돼 있었으면 true
    pub fn release(&self, tab_id: TabId) -> bool {
        let removed = self.tabs.write().remove(&tab_id);
        if removed {
            debug!("생성 탭 해제: {tab_id}");
        }
        removed
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.tabs.read().contains(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.tabs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.read().is_empty()
    }
}
