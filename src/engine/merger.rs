use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{AudioBuffers, FieldUpdate, SparseTable};

/// A structure extraction results can be folded into
pub trait Merge<U>: Send + 'static {
    fn merge(&mut self, device_id: &str, update: U);
}

impl Merge<Vec<FieldUpdate>> for SparseTable {
    fn merge(&mut self, _device_id: &str, updates: Vec<FieldUpdate>) {
        for update in &updates {
            self.apply(update);
        }
    }
}

impl Merge<Vec<i16>> for AudioBuffers {
    fn merge(&mut self, device_id: &str, samples: Vec<i16>) {
        self.channel_mut(device_id).append(&samples);
    }
}

/// Owner of the session's merge target.
///
/// Handles are cloned into each extraction worker; every merge happens
/// inside one critical section, so a device's updates land all at once.
pub struct Merger<T> {
    shared: Arc<Mutex<T>>,
}

impl<T> Clone for Merger<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Merger<T> {
    pub fn new(target: T) -> Self {
        Self {
            shared: Arc::new(Mutex::new(target)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn merge<U>(&self, device_id: &str, update: U)
    where
        T: Merge<U>,
    {
        self.lock().merge(device_id, update);
    }

    /// Read the target under the lock
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.lock();
        f(&*guard)
    }

    /// Recover the target. Other handles still alive are left holding an
    /// empty default.
    pub fn into_inner(self) -> T
    where
        T: Default,
    {
        match Arc::try_unwrap(self.shared) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(shared) => {
                let mut guard = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                std::mem::take(&mut *guard)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnNaming;
    use chrono::{TimeZone, Utc};

    fn update(device: &str, tag: &str, ms: i64, value: &str) -> FieldUpdate {
        FieldUpdate {
            timestamp: Utc.timestamp_millis_opt(ms).unwrap(),
            device_id: device.to_string(),
            field_tag: tag.to_string(),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_concurrent_merges_lose_nothing() {
        let devices: Vec<String> = (0..8).map(|i| format!("dev{i}")).collect();
        let merger = Merger::new(SparseTable::for_devices(ColumnNaming::Qualified, &devices));

        std::thread::scope(|scope| {
            for device in &devices {
                let merger = merger.clone();
                scope.spawn(move || {
                    let updates = (0..50).map(|ms| update(device, "Load", ms, "1")).collect::<Vec<_>>();
                    merger.merge(device, updates);
                });
            }
        });

        let table = merger.into_inner();
        assert_eq!(table.columns().len(), 8);
        assert_eq!(table.row_count(), 50);
    }

    #[test]
    fn test_audio_merge_appends_per_channel() {
        let devices = vec!["mic-a".to_string()];
        let merger = Merger::new(AudioBuffers::new(&devices, Utc.timestamp_millis_opt(0).unwrap()));

        merger.merge("mic-a", vec![1i16, 2]);
        merger.merge("mic-a", vec![3i16]);

        let len = merger.with(|buffers| buffers.channel("mic-a").map(|c| c.len()));
        assert_eq!(len, Some(3));
    }

    #[test]
    fn test_into_inner_with_outstanding_handle() {
        let merger = Merger::new(vec![1, 2, 3]);
        let other = merger.clone();

        assert_eq!(merger.into_inner(), vec![1, 2, 3]);
        assert!(other.with(|v| v.is_empty()));
    }
}
