//! 구독 종목 레지스트리.

use std::sync::{Mutex, MutexGuard};

/// 현재 구독 중인 종목 집합.
///
/// 종목은 중복 없이 등록 순서대로 보관됩니다. 재연결 후 구독 복원은
/// 등록 순서 그대로 재생되어야 이전 와이어 상태가 결정적으로
/// 재현되기 때문입니다. 별도로 영속화하지 않으며, 재연결 시 이
/// 레지스트리에서 다시 구독합니다.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    symbols: Mutex<Vec<String>>,
}

impl SubscriptionRegistry {
    /// 빈 레지스트리 생성.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.symbols.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 종목 등록. 이미 있으면 `false`.
    pub fn insert(&self, symbol: &str) -> bool {
        let mut symbols = self.lock();
        if symbols.iter().any(|s| s == symbol) {
            return false;
        }
        symbols.push(symbol.to_string());
        true
    }

    /// 종목 제거. 없었으면 `false`.
    pub fn remove(&self, symbol: &str) -> bool {
        let mut symbols = self.lock();
        let before = symbols.len();
        symbols.retain(|s| s != symbol);
        symbols.len() != before
    }

    /// 등록 여부 확인.
    pub fn contains(&self, symbol: &str) -> bool {
        self.lock().iter().any(|s| s == symbol)
    }

    /// 등록 순서 그대로의 복사본 반환.
    ///
    /// 호출자가 복사본을 변형해도 내부 상태는 바뀌지 않습니다.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// 전체 비우기 (세션 중지 시).
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 등록된 종목 수.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
