//! Encoded datasets and mini-batch loading

use super::{encode_one_hot, ResponseTable, Split};
use crate::{Error, Result, Tensor};
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A mini-batch of encoded rows
///
/// `data` holds the rows flattened in row-major order and never requires
/// gradients.
#[derive(Debug, Clone)]
pub struct Batch {
    pub data: Tensor,
    pub rows: usize,
    pub cols: usize,
}

impl Batch {
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "batch data must be rows * cols");
        Self {
            data: Tensor::from_vec(data, false),
            rows,
            cols,
        }
    }

    pub fn from_array(rows: ArrayView2<'_, f32>) -> Self {
        let (r, c) = rows.dim();
        Self::new(rows.iter().copied().collect(), r, c)
    }

    /// Matrix view of the batch
    pub fn view(&self) -> Result<ArrayView2<'_, f32>> {
        self.data
            .data()
            .view()
            .into_shape_with_order((self.rows, self.cols))
            .map_err(|_| Error::ShapeMismatch {
                expected: vec![self.rows, self.cols],
                got: vec![self.data.len()],
            })
    }

    /// Number of rows in the batch
    pub fn size(&self) -> usize {
        self.rows
    }
}

/// One-hot encoded responses selected by a [`Split`]
#[derive(Debug, Clone)]
pub struct ResponseDataset {
    encoded: Array2<f32>,
}

impl ResponseDataset {
    /// Encode `table` with `categories` and keep the rows chosen by `split`
    pub fn new(
        table: &ResponseTable,
        categories: &[usize],
        split: Split,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let indices = split.indices(table.nrows(), rng);
        let encoded = encode_one_hot(&table.select_rows(&indices), categories)?;
        Ok(Self { encoded })
    }

    pub fn from_encoded(encoded: Array2<f32>) -> Self {
        Self { encoded }
    }

    pub fn len(&self) -> usize {
        self.encoded.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.nrows() == 0
    }

    /// Encoded row width (the model input dimension)
    pub fn width(&self) -> usize {
        self.encoded.ncols()
    }

    pub fn encoded(&self) -> &Array2<f32> {
        &self.encoded
    }
}

/// Yields mini-batches over a dataset, one pass per call to [`DataLoader::batches`]
#[derive(Debug)]
pub struct DataLoader {
    dataset: ResponseDataset,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(dataset: ResponseDataset, batch_size: usize, shuffle: bool) -> Self {
        Self::with_rng(dataset, batch_size, shuffle, StdRng::from_os_rng())
    }

    /// Loader with a deterministic shuffling order
    pub fn seeded(dataset: ResponseDataset, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        Self::with_rng(dataset, batch_size, shuffle, StdRng::seed_from_u64(seed))
    }

    fn with_rng(dataset: ResponseDataset, batch_size: usize, shuffle: bool, rng: StdRng) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle,
            rng,
        }
    }

    pub fn dataset(&self) -> &ResponseDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches in one pass; the last one may be short
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Batches for one pass over the dataset, reshuffled when enabled
    pub fn batches(&mut self) -> Vec<Batch> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }

        order
            .chunks(self.batch_size)
            .map(|chunk| Batch::from_array(self.dataset.encoded.select(Axis(0), chunk).view()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> ResponseDataset {
        let rows: Vec<Vec<f32>> = (0..n).map(|i| vec![(i % 2) as f32]).collect();
        let table = ResponseTable::from_rows(rows).unwrap();
        ResponseDataset::new(&table, &[2], Split::Full, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn test_batch_view() {
        let batch = Batch::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        assert_eq!(batch.view().unwrap()[[1, 0]], 4.0);
        assert_eq!(batch.size(), 2);
        assert!(!batch.data.requires_grad());
    }

    #[test]
    #[should_panic(expected = "rows * cols")]
    fn test_batch_shape_mismatch() {
        Batch::new(vec![1.0, 2.0, 3.0], 2, 2);
    }

    #[test]
    fn test_dataset_width_is_encoded() {
        let ds = dataset(5);
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.width(), 2);
    }

    #[test]
    fn test_last_batch_is_short() {
        let mut loader = DataLoader::seeded(dataset(70), 32, false, 0);
        let batches = loader.batches();

        assert_eq!(loader.num_batches(), 3);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].rows, 32);
        assert_eq!(batches[2].rows, 6);
    }

    #[test]
    fn test_pass_covers_every_row_once() {
        let mut loader = DataLoader::seeded(dataset(10), 3, true, 9);
        let total: f32 = loader.batches().iter().map(|b| b.data.data().sum()).sum();
        // each encoded row contains exactly one indicator
        assert_eq!(total, 10.0);
    }

    #[test]
    fn test_shuffle_changes_between_passes() {
        let rows: Vec<Vec<f32>> = (0..64).map(|i| vec![(i % 4) as f32]).collect();
        let table = ResponseTable::from_rows(rows).unwrap();
        let ds =
            ResponseDataset::new(&table, &[4], Split::Full, &mut StdRng::seed_from_u64(0)).unwrap();
        let mut loader = DataLoader::seeded(ds, 64, true, 3);

        let first = loader.batches()[0].data.data().clone();
        let second = loader.batches()[0].data.data().clone();
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_dataset_has_no_batches() {
        let mut loader = DataLoader::new(ResponseDataset::from_encoded(Array2::zeros((0, 3))), 4, true);
        assert!(loader.batches().is_empty());
        assert_eq!(loader.num_batches(), 0);
    }
}
