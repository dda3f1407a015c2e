use crate::volume::LabelVolume;

/// Quality criterion driving the merge.
///
/// The merger treats `Cache` as opaque: it only computes it per region,
/// combines two of them when regions merge and asks the criterion to score
/// or classify the result. `evaluate`, `evaluate_without_size_penalty`,
/// `combine` and `is_complete` must be pure.
pub trait Criterion<V: LabelVolume + ?Sized> {
    type Cache: Clone;

    /// Initial statistics of the region carrying `label`.
    fn cache(&self, volume: &V, label: V::Label) -> anyhow::Result<Self::Cache>;

    /// Caches for several labels, in the order given. Criteria that can
    /// gather every region in one pass over the volume should override this.
    fn caches(&self, volume: &V, labels: &[V::Label]) -> anyhow::Result<Vec<Self::Cache>> {
        labels
            .iter()
            .map(|&label| self.cache(volume, label))
            .collect()
    }

    /// Full quality, used to order regions and to decide whether a complete
    /// region is worth growing.
    fn evaluate(&self, cache: &Self::Cache) -> f64;

    /// Quality used only to rank merge candidates.
    fn evaluate_without_size_penalty(&self, cache: &Self::Cache) -> f64;

    fn combine(&self, a: &Self::Cache, b: &Self::Cache) -> Self::Cache;

    fn is_complete(&self, cache: &Self::Cache) -> bool;
}
