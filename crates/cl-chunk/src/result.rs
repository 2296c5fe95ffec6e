/// A result that can be accumulated chunk by chunk.
///
/// `Default` is the empty result. Structured results implement `concat`
/// field by field, keeping each field's order.
pub trait ChunkResult: Default {
    fn concat(self, other: Self) -> Self;
}

impl<T> ChunkResult for Vec<T> {
    fn concat(mut self, other: Self) -> Self {
        self.extend(other);
        self
    }
}

impl ChunkResult for () {
    fn concat(self, _other: Self) -> Self {}
}

/// Fold two chunk results into one, `a` first.
pub fn concat_results<R: ChunkResult>(a: R, b: R) -> R {
    a.concat(b)
}
