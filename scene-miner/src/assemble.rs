//! # Assemble 模块
//!
//! 最终汇总阶段的去重与排序。
//!
//! 同一个键只保留第一次出现的项，结果按键排序。
//! 输出只取决于输入顺序和键，与并行阶段的完成顺序无关。

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// 去重结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduped<T> {
    /// 按键升序排列的保留项
    pub items: Vec<T>,
    /// 被丢弃的重复项数量
    pub duplicates: usize,
}

impl<T> Default for Deduped<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            duplicates: 0,
        }
    }
}

/// 按键去重并排序（先出现者优先）
pub fn dedup_sorted<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Deduped<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut kept: BTreeMap<K, T> = BTreeMap::new();
    let mut duplicates = 0;

    for item in items {
        match kept.entry(key(&item)) {
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
            Entry::Occupied(_) => duplicates += 1,
        }
    }

    Deduped {
        items: kept.into_values().collect(),
        duplicates,
    }
}
