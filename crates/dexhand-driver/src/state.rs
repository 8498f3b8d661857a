//! 共享状态表
//!
//! 每个条目独立的 `ArcSwapOption`：轮询线程是唯一写者，读者拿到的是完整快照的拷贝，
//! 更新一个条目不会阻塞其他条目的读取。`None` 表示"未知"，不保留过期数据。

use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// 定长的单写者 / 多读者快照表
pub struct SnapshotTable<T> {
    entries: Box<[ArcSwapOption<T>]>,
}

impl<T: Clone> SnapshotTable<T> {
    pub fn new(len: usize) -> Self {
        Self {
            entries: (0..len).map(|_| ArcSwapOption::empty()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 替换一个条目（越界时忽略）
    pub fn store(&self, index: usize, value: Option<T>) {
        if let Some(entry) = self.entries.get(index) {
            entry.store(value.map(Arc::new));
        }
    }

    /// 读取一个条目的拷贝
    pub fn get(&self, index: usize) -> Option<T> {
        self.entries
            .get(index)
            .and_then(|entry| entry.load().as_ref().map(|v| T::clone(v)))
    }

    /// 全表快照
    pub fn snapshot(&self) -> Vec<Option<T>> {
        (0..self.entries.len()).map(|i| self.get(i)).collect()
    }

    pub fn clear(&self) {
        for entry in self.entries.iter() {
            entry.store(None);
        }
    }
}

impl<T> std::fmt::Debug for SnapshotTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotTable")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_get() {
        let table = SnapshotTable::<i32>::new(3);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), None);

        table.store(1, Some(42));
        assert_eq!(table.get(1), Some(42));
        assert_eq!(table.snapshot(), vec![None, Some(42), None]);

        table.store(1, None);
        assert_eq!(table.get(1), None);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let table = SnapshotTable::<i32>::new(1);
        table.store(5, Some(1));
        assert_eq!(table.get(5), None);
    }

    #[test]
    fn test_clear() {
        let table = SnapshotTable::<i32>::new(2);
        table.store(0, Some(1));
        table.store(1, Some(2));
        table.clear();
        assert_eq!(table.snapshot(), vec![None, None]);
    }

    #[test]
    fn test_concurrent_readers_see_whole_entries() {
        let table = Arc::new(SnapshotTable::<(u32, u32)>::new(1));
        let writer_table = table.clone();
        let writer = std::thread::spawn(move || {
            for i in 0..1000u32 {
                writer_table.store(0, Some((i, i)));
            }
        });
        for _ in 0..1000 {
            if let Some((a, b)) = table.get(0) {
                assert_eq!(a, b);
            }
        }
        writer.join().unwrap();
    }
}
