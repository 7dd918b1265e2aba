//! One-hot encoding of categorical responses

use super::ResponseTable;
use crate::{Error, Result};
use ndarray::Array2;

/// Width of the encoded matrix: one indicator column per category
pub fn encoded_width(categories: &[usize]) -> usize {
    categories.iter().sum()
}

/// Expand each item column into indicator columns
///
/// Column `j` with `categories[j] = k` becomes `k` columns; response `c`
/// sets the `c`-th of them to 1. A missing response leaves all `k` at 0.
pub fn encode_one_hot(table: &ResponseTable, categories: &[usize]) -> Result<Array2<f32>> {
    if categories.len() != table.ncols() {
        return Err(Error::ShapeMismatch {
            expected: vec![categories.len()],
            got: vec![table.ncols()],
        });
    }
    if let Some(j) = categories.iter().position(|&k| k == 0) {
        return Err(Error::Data(format!("item {j} has zero categories")));
    }

    let offsets: Vec<usize> = categories
        .iter()
        .scan(0, |acc, &k| {
            let start = *acc;
            *acc += k;
            Some(start)
        })
        .collect();

    let mut encoded = Array2::zeros((table.nrows(), encoded_width(categories)));

    for (i, row) in table.values().rows().into_iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            if value.is_nan() {
                continue;
            }
            let k = categories[j];
            if value < 0.0 || value.fract() != 0.0 || value as usize >= k {
                return Err(Error::Data(format!(
                    "row {i}, item {j}: response {value} is not a category in 0..{k}"
                )));
            }
            encoded[[i, offsets[j] + value as usize]] = 1.0;
        }
    }

    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: Vec<Vec<f32>>) -> ResponseTable {
        ResponseTable::from_rows(rows).unwrap()
    }

    #[test]
    fn test_one_hot_layout() {
        let t = table(vec![vec![0.0, 2.0], vec![1.0, 0.0]]);
        let encoded = encode_one_hot(&t, &[2, 3]).unwrap();

        assert_eq!(encoded.dim(), (2, 5));
        assert_eq!(encoded.row(0).to_vec(), vec![1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(encoded.row(1).to_vec(), vec![0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_encodes_as_zeros() {
        let t = table(vec![vec![f32::NAN, 1.0]]);
        let encoded = encode_one_hot(&t, &[2, 2]).unwrap();
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_each_row_sums_to_observed_items() {
        let t = table(vec![vec![0.0, 1.0, 2.0], vec![1.0, f32::NAN, 0.0]]);
        let encoded = encode_one_hot(&t, &[2, 2, 3]).unwrap();
        assert_eq!(encoded.row(0).sum(), 3.0);
        assert_eq!(encoded.row(1).sum(), 2.0);
    }

    #[test]
    fn test_out_of_range_response() {
        let t = table(vec![vec![3.0]]);
        assert!(encode_one_hot(&t, &[3]).is_err());
    }

    #[test]
    fn test_fractional_response() {
        let t = table(vec![vec![0.5]]);
        assert!(encode_one_hot(&t, &[2]).is_err());
    }

    #[test]
    fn test_category_count_mismatch() {
        let t = table(vec![vec![0.0, 1.0]]);
        assert!(matches!(
            encode_one_hot(&t, &[2]),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
