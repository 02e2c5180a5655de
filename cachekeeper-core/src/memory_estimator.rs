use std::sync::Arc;

/// Estimates how many bytes a cached key or value occupies.
///
/// `Cache::byte_size` and `Cache::cheap_byte_size` sum this over every key and
/// value currently stored. The default implementation only accounts for the
/// stack size of the value; types owning heap data should override it.
///
/// Types with shared ownership (such as `Arc<T>`) additionally report a
/// [`shared_identity`](MemoryEstimator::shared_identity) so that the deep
/// estimate counts the shared allocation once no matter how many entries point
/// at it.
///
/// # Examples
///
/// ```
/// use cachekeeper_core::MemoryEstimator;
///
/// struct Document {
///     title: String,
///     body: Vec<u8>,
/// }
///
/// impl MemoryEstimator for Document {
///     fn estimate_memory(&self) -> usize {
///         std::mem::size_of::<Self>() + self.title.capacity() + self.body.capacity()
///     }
/// }
///
/// let doc = Document { title: "index".to_string(), body: vec![0; 128] };
/// assert!(doc.estimate_memory() >= 128);
/// ```
pub trait MemoryEstimator {
    /// Estimates the total memory size of this value in bytes, heap included.
    fn estimate_memory(&self) -> usize {
        std::mem::size_of_val(self)
    }

    /// Address of the shared allocation behind this value, if any.
    ///
    /// Two values returning the same identity are counted once by the deep
    /// byte-size estimate.
    fn shared_identity(&self) -> Option<usize> {
        None
    }
}

impl MemoryEstimator for i8 {}
impl MemoryEstimator for i16 {}
impl MemoryEstimator for i32 {}
impl MemoryEstimator for i64 {}
impl MemoryEstimator for i128 {}
impl MemoryEstimator for isize {}

impl MemoryEstimator for u8 {}
impl MemoryEstimator for u16 {}
impl MemoryEstimator for u32 {}
impl MemoryEstimator for u64 {}
impl MemoryEstimator for u128 {}
impl MemoryEstimator for usize {}

impl MemoryEstimator for f32 {}
impl MemoryEstimator for f64 {}

impl MemoryEstimator for bool {}
impl MemoryEstimator for char {}

impl MemoryEstimator for () {}

impl MemoryEstimator for str {}

impl MemoryEstimator for String {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + self.capacity()
    }
}

impl<T> MemoryEstimator for [T]
where
    T: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        self.iter().map(|item| item.estimate_memory()).sum()
    }
}

impl<T> MemoryEstimator for Vec<T>
where
    T: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        let base = std::mem::size_of::<Self>();
        let elements: usize = self.iter().map(|item| item.estimate_memory()).sum();
        base + elements
    }
}

impl<T> MemoryEstimator for Option<T>
where
    T: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + match self {
                Some(val) => val.estimate_memory(),
                None => 0,
            }
    }

    fn shared_identity(&self) -> Option<usize> {
        self.as_ref().and_then(|val| val.shared_identity())
    }
}

impl<T1, T2> MemoryEstimator for (T1, T2)
where
    T1: MemoryEstimator,
    T2: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.estimate_memory() + self.1.estimate_memory()
    }
}

impl<T1, T2, T3> MemoryEstimator for (T1, T2, T3)
where
    T1: MemoryEstimator,
    T2: MemoryEstimator,
    T3: MemoryEstimator,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.0.estimate_memory()
            + self.1.estimate_memory()
            + self.2.estimate_memory()
    }
}

impl<T> MemoryEstimator for Box<T>
where
    T: MemoryEstimator + ?Sized,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + (**self).estimate_memory()
    }
}

impl<T> MemoryEstimator for Arc<T>
where
    T: MemoryEstimator + ?Sized,
{
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + (**self).estimate_memory()
    }

    fn shared_identity(&self) -> Option<usize> {
        Some(Arc::as_ptr(self) as *const () as usize)
    }
}
