//! Parameter-change set presented to the hosted processor.
//!
//! When the control channel or the hosted editor has queued changes, the
//! audio callback copies the host's automation into a
//! [`MergedParameterChanges`] and adds one point at sample offset 0 per
//! queued change. Storage is preallocated and reused between blocks.

use std::cell::UnsafeCell;

use vmcw_core::ParamChange;
use vst3::Steinberg::Vst::{
    IParamValueQueue, IParamValueQueueTrait, IParameterChanges, IParameterChangesTrait, ParamID,
    ParamValue,
};
use vst3::Steinberg::{int32, kInvalidArgument, kResultFalse, kResultOk, tresult};
use vst3::{Class, ComRef, ComWrapper};

/// Parameter queues preallocated per block.
pub const MAX_MERGED_QUEUES: usize = 512;

/// Points preallocated per queue.
pub const POINTS_PER_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    offset: int32,
    value: ParamValue,
}

// =============================================================================
// MergedParamValueQueue
// =============================================================================

/// Points for one parameter, kept sorted by sample offset.
pub struct MergedParamValueQueue {
    id: UnsafeCell<ParamID>,
    points: UnsafeCell<Vec<Point>>,
}

impl MergedParamValueQueue {
    fn new() -> Self {
        Self {
            id: UnsafeCell::new(0),
            points: UnsafeCell::new(Vec::with_capacity(POINTS_PER_QUEUE)),
        }
    }

    /// Reuse this queue for `id`.
    ///
    /// # Safety
    ///
    /// No other reference into this queue may be live.
    unsafe fn reset(&self, id: ParamID) {
        // SAFETY: Exclusive access per caller contract.
        unsafe {
            *self.id.get() = id;
            (*self.points.get()).clear();
        }
    }

    /// Insert keeping offsets ascending. A point at an existing offset
    /// replaces that point's value. Returns the point index.
    ///
    /// # Safety
    ///
    /// No other reference into this queue may be live.
    unsafe fn insert(&self, offset: int32, value: ParamValue) -> usize {
        // SAFETY: Exclusive access per caller contract.
        let points = unsafe { &mut *self.points.get() };
        match points.binary_search_by_key(&offset, |p| p.offset) {
            Ok(index) => {
                points[index].value = value;
                index
            }
            Err(index) => {
                points.insert(index, Point { offset, value });
                index
            }
        }
    }

    #[cfg(test)]
    fn snapshot(&self) -> Vec<(int32, ParamValue)> {
        // SAFETY: Tests run single-threaded against this object.
        unsafe { (*self.points.get()).iter().map(|p| (p.offset, p.value)).collect() }
    }
}

impl Class for MergedParamValueQueue {
    type Interfaces = (IParamValueQueue,);
}

impl IParamValueQueueTrait for MergedParamValueQueue {
    unsafe fn getParameterId(&self) -> ParamID {
        // SAFETY: The audio thread is the only user during process.
        unsafe { *self.id.get() }
    }

    unsafe fn getPointCount(&self) -> int32 {
        // SAFETY: The audio thread is the only user during process.
        unsafe { (*self.points.get()).len() as int32 }
    }

    unsafe fn getPoint(
        &self,
        index: int32,
        sample_offset: *mut int32,
        value: *mut ParamValue,
    ) -> tresult {
        if sample_offset.is_null() || value.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: The audio thread is the only user during process.
        let points = unsafe { &*self.points.get() };
        let Some(point) = usize::try_from(index).ok().and_then(|i| points.get(i)) else {
            return kResultFalse;
        };
        // SAFETY: Out-parameters checked non-null above.
        unsafe {
            *sample_offset = point.offset;
            *value = point.value;
        }
        kResultOk
    }

    unsafe fn addPoint(&self, sample_offset: int32, value: ParamValue, index: *mut int32) -> tresult {
        // SAFETY: The audio thread is the only user during process.
        let at = unsafe { self.insert(sample_offset, value) };
        if !index.is_null() {
            // SAFETY: Non-null out-parameter supplied by the caller.
            unsafe { *index = at as int32 };
        }
        kResultOk
    }
}

// =============================================================================
// MergedParameterChanges
// =============================================================================

/// `IParameterChanges` built fresh for each block that has queued changes.
pub struct MergedParameterChanges {
    count: UnsafeCell<usize>,
    queues: UnsafeCell<Vec<ComWrapper<MergedParamValueQueue>>>,
}

// SAFETY: Only the audio thread mutates the set, inside process(), while
// holding the processor's hosted-side lock.
unsafe impl Send for MergedParameterChanges {}
// SAFETY: See the Send impl above.
unsafe impl Sync for MergedParameterChanges {}

impl MergedParameterChanges {
    pub fn new() -> Self {
        let queues = (0..MAX_MERGED_QUEUES)
            .map(|_| ComWrapper::new(MergedParamValueQueue::new()))
            .collect();
        Self {
            count: UnsafeCell::new(0),
            queues: UnsafeCell::new(queues),
        }
    }

    /// Forget every queue. Storage is kept.
    pub fn clear(&self) {
        // SAFETY: Called by the owning audio thread between blocks.
        unsafe { *self.count.get() = 0 };
    }

    /// Number of parameters in the set.
    pub fn len(&self) -> usize {
        // SAFETY: Plain read by the owning thread.
        unsafe { *self.count.get() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the queue for `id`, adding one when absent.
    ///
    /// # Safety
    ///
    /// No pointer handed out by this set may be in use by another thread.
    unsafe fn find_or_add(&self, id: ParamID) -> usize {
        // SAFETY: Exclusive access per caller contract.
        let (count, queues) = unsafe { (&mut *self.count.get(), &mut *self.queues.get()) };
        for (index, queue) in queues[..*count].iter().enumerate() {
            // SAFETY: Exclusive access.
            if unsafe { *queue.id.get() } == id {
                return index;
            }
        }
        if *count == queues.len() {
            // Past the preallocation; only reached by unusually dense blocks.
            queues.push(ComWrapper::new(MergedParamValueQueue::new()));
        }
        let index = *count;
        // SAFETY: Exclusive access.
        unsafe { queues[index].reset(id) };
        *count += 1;
        index
    }

    /// Rebuild the set from the host's changes plus `queued`.
    ///
    /// Host points keep their offsets and order. Each queued change becomes a
    /// point at offset 0 on its parameter's queue; repeated ids collapse to
    /// the last queued value.
    ///
    /// # Safety
    ///
    /// `host` must be null or a live `IParameterChanges` for the duration of
    /// the call, and the set must not be in use by the hosted processor.
    pub unsafe fn merge(&self, host: *mut IParameterChanges, queued: &[ParamChange]) {
        self.clear();

        // SAFETY: host is null or live per caller contract.
        if let Some(host) = unsafe { ComRef::from_raw(host) } {
            // SAFETY: Host object and its queues are live for this call.
            unsafe { self.copy_host(host) };
        }

        for change in queued {
            // SAFETY: Exclusive access per caller contract.
            unsafe {
                let index = self.find_or_add(change.id);
                (&(*self.queues.get()))[index].insert(0, change.value);
            }
        }
    }

    unsafe fn copy_host(&self, host: ComRef<'_, IParameterChanges>) {
        // SAFETY: The host object is live; see merge.
        let count = unsafe { host.getParameterCount() };
        for i in 0..count {
            // SAFETY: i is within the count the host reported.
            let Some(queue) = (unsafe { ComRef::from_raw(host.getParameterData(i)) }) else {
                continue;
            };
            // SAFETY: The host queue is live.
            let (id, points) = unsafe { (queue.getParameterId(), queue.getPointCount()) };
            // SAFETY: Exclusive access to self.
            let index = unsafe { self.find_or_add(id) };
            for p in 0..points {
                let mut offset: int32 = 0;
                let mut value: ParamValue = 0.0;
                // SAFETY: Locals are valid out-parameters.
                if unsafe { queue.getPoint(p, &mut offset, &mut value) } == kResultOk {
                    // SAFETY: Exclusive access to self.
                    unsafe { (&(*self.queues.get()))[index].insert(offset, value) };
                }
            }
        }
    }
}

impl Default for MergedParameterChanges {
    fn default() -> Self {
        Self::new()
    }
}

impl Class for MergedParameterChanges {
    type Interfaces = (IParameterChanges,);
}

impl IParameterChangesTrait for MergedParameterChanges {
    unsafe fn getParameterCount(&self) -> int32 {
        self.len() as int32
    }

    unsafe fn getParameterData(&self, index: int32) -> *mut IParamValueQueue {
        let Ok(index) = usize::try_from(index) else {
            return std::ptr::null_mut();
        };
        if index >= self.len() {
            return std::ptr::null_mut();
        }
        // SAFETY: Index is below count, so the queue is initialized.
        unsafe { &*self.queues.get() }
            .get(index)
            .and_then(|q| q.as_com_ref::<IParamValueQueue>())
            .map(|r| r.as_ptr())
            .unwrap_or(std::ptr::null_mut())
    }

    unsafe fn addParameterData(&self, id: *const ParamID, index: *mut int32) -> *mut IParamValueQueue {
        if id.is_null() {
            return std::ptr::null_mut();
        }
        // SAFETY: id checked non-null; the set is used by one thread.
        let at = unsafe { self.find_or_add(*id) };
        if !index.is_null() {
            // SAFETY: Non-null out-parameter supplied by the caller.
            unsafe { *index = at as int32 };
        }
        // SAFETY: at < count after find_or_add.
        unsafe { self.getParameterData(at as int32) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with(points: &[(ParamID, int32, ParamValue)]) -> ComWrapper<MergedParameterChanges> {
        let host = ComWrapper::new(MergedParameterChanges::new());
        for &(id, offset, value) in points {
            // SAFETY: Test-local object.
            unsafe {
                let queue = host.addParameterData(&id, std::ptr::null_mut());
                let queue = ComRef::from_raw(queue).unwrap();
                queue.addPoint(offset, value, std::ptr::null_mut());
            }
        }
        host
    }

    fn queue_points(set: &MergedParameterChanges, index: usize) -> (ParamID, Vec<(int32, ParamValue)>) {
        // SAFETY: Test-local object.
        let queues = unsafe { &*set.queues.get() };
        // SAFETY: Test-local object.
        (unsafe { queues[index].getParameterId() }, queues[index].snapshot())
    }

    #[test]
    fn test_queued_change_joins_host_automation() {
        let host = host_with(&[(7, 5, 0.20)]);
        let host_ptr = host.to_com_ptr::<IParameterChanges>().unwrap();
        let merged = MergedParameterChanges::new();

        // SAFETY: host is live for the call.
        unsafe { merged.merge(host_ptr.as_ptr(), &[ParamChange { id: 7, value: 0.90 }]) };

        assert_eq!(merged.len(), 1);
        assert_eq!(queue_points(&merged, 0), (7, vec![(0, 0.90), (5, 0.20)]));
    }

    #[test]
    fn test_distinct_ids_get_separate_queues() {
        let host = host_with(&[(1, 0, 0.1), (1, 32, 0.3)]);
        let host_ptr = host.to_com_ptr::<IParameterChanges>().unwrap();
        let merged = MergedParameterChanges::new();

        // SAFETY: host is live for the call.
        unsafe { merged.merge(host_ptr.as_ptr(), &[ParamChange { id: 2, value: 0.5 }]) };

        assert_eq!(merged.len(), 2);
        assert_eq!(queue_points(&merged, 0), (1, vec![(0, 0.1), (32, 0.3)]));
        assert_eq!(queue_points(&merged, 1), (2, vec![(0, 0.5)]));
    }

    #[test]
    fn test_same_offset_keeps_queued_value() {
        let host = host_with(&[(3, 0, 0.25)]);
        let host_ptr = host.to_com_ptr::<IParameterChanges>().unwrap();
        let merged = MergedParameterChanges::new();
        let queued = [ParamChange { id: 3, value: 0.6 }, ParamChange { id: 3, value: 0.7 }];

        // SAFETY: host is live for the call.
        unsafe { merged.merge(host_ptr.as_ptr(), &queued) };

        assert_eq!(queue_points(&merged, 0), (3, vec![(0, 0.7)]));
    }

    #[test]
    fn test_merge_without_host_changes() {
        let merged = MergedParameterChanges::new();
        // SAFETY: Null host is allowed.
        unsafe { merged.merge(std::ptr::null_mut(), &[ParamChange { id: 9, value: 1.0 }]) };
        assert_eq!(merged.len(), 1);

        // Reuse clears the previous block.
        // SAFETY: Null host is allowed.
        unsafe { merged.merge(std::ptr::null_mut(), &[]) };
        assert!(merged.is_empty());
    }

    #[test]
    fn test_queue_access_bounds() {
        let set = host_with(&[(4, 10, 0.4)]);
        let mut offset = 0;
        let mut value = 0.0;
        // SAFETY: Test-local object.
        unsafe {
            assert!(set.getParameterData(1).is_null());
            assert!(set.getParameterData(-1).is_null());
            let queue = ComRef::from_raw(set.getParameterData(0)).unwrap();
            assert_eq!(queue.getPoint(1, &mut offset, &mut value), kResultFalse);
            assert_eq!(queue.getPoint(0, &mut offset, &mut value), kResultOk);
        }
        assert_eq!((offset, value), (10, 0.4));
    }

    #[test]
    fn test_grows_past_preallocation() {
        let merged = MergedParameterChanges::new();
        let queued: Vec<ParamChange> = (0..MAX_MERGED_QUEUES as u32 + 3)
            .map(|id| ParamChange { id, value: 0.5 })
            .collect();
        // SAFETY: Null host is allowed.
        unsafe { merged.merge(std::ptr::null_mut(), &queued) };
        assert_eq!(merged.len(), MAX_MERGED_QUEUES + 3);
    }
}
