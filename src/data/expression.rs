//! The normalized gene-by-sample expression matrix.
//!
//! Upstream counting and normalization already happened; this type just
//! holds the dense result with id lookups in both directions. Column
//! headers pass through [`normalize_sample_key`] so matrices written by the
//! counting step (`<sample>_read_count.tsv` column names) line up with the
//! sample sheet without renaming.

use std::collections::HashMap;
use std::path::Path;

use log::warn;
use nalgebra::DMatrix;

use crate::data::sample_table::normalize_sample_key;
use crate::error::{QcError, Result};

/// Dense normalized expression, genes as rows and samples as columns.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    data: DMatrix<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
    gene_index: HashMap<String, usize>,
    sample_index: HashMap<String, usize>,
}

impl ExpressionMatrix {
    /// Build from row-major values. Gene and sample ids must be unique.
    pub fn new(gene_ids: Vec<String>, sample_ids: Vec<String>, values: Vec<f64>) -> Result<Self> {
        let expected = gene_ids.len() * sample_ids.len();
        if values.len() != expected {
            return Err(QcError::DimensionMismatch {
                expected,
                actual: values.len(),
            });
        }
        let data = DMatrix::from_row_slice(gene_ids.len(), sample_ids.len(), &values);
        Self::from_parts(data, gene_ids, sample_ids)
    }

    fn from_parts(data: DMatrix<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let mut gene_index = HashMap::with_capacity(gene_ids.len());
        for (i, id) in gene_ids.iter().enumerate() {
            if gene_index.insert(id.clone(), i).is_some() {
                return Err(QcError::InvalidParameter(format!(
                    "duplicate gene id '{}' in expression matrix",
                    id
                )));
            }
        }
        let mut sample_index = HashMap::with_capacity(sample_ids.len());
        for (i, id) in sample_ids.iter().enumerate() {
            if sample_index.insert(id.clone(), i).is_some() {
                return Err(QcError::InvalidParameter(format!(
                    "duplicate sample column '{}' in expression matrix",
                    id
                )));
            }
        }
        Ok(ExpressionMatrix {
            data,
            gene_ids,
            sample_ids,
            gene_index,
            sample_index,
        })
    }

    /// Load from a CSV file.
    ///
    /// First row: header whose first cell is the gene-id column (name
    /// ignored) followed by sample columns; sample names are normalized.
    /// `NA` and empty cells become NaN; anything else that fails to parse
    /// as a number is fatal.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(QcError::EmptyData(
                "expression matrix has no sample columns".to_string(),
            ));
        }
        let sample_ids: Vec<String> = headers
            .iter()
            .skip(1)
            .map(normalize_sample_key)
            .collect();
        let n_samples = sample_ids.len();

        let mut gene_ids = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let gene_id = record.get(0).unwrap_or("").trim().to_string();
            gene_ids.push(gene_id);
            for col_idx in 0..n_samples {
                let raw = record.get(col_idx + 1).unwrap_or("").trim();
                let value = if raw.is_empty() || raw == "NA" || raw == "na" {
                    f64::NAN
                } else {
                    raw.parse::<f64>().map_err(|_| QcError::InvalidValue {
                        value: raw.to_string(),
                        row: row_idx,
                        col: col_idx,
                    })?
                };
                values.push(value);
            }
        }
        if gene_ids.is_empty() {
            return Err(QcError::EmptyData(
                "no gene rows in expression matrix".to_string(),
            ));
        }
        let data = DMatrix::from_row_slice(gene_ids.len(), n_samples, &values);
        Self::from_parts(data, gene_ids, sample_ids)
    }

    /// Restrict to the given genes, in list order.
    ///
    /// Genes absent from the matrix are dropped with a warning; an empty
    /// intersection is fatal.
    pub fn restrict_genes(&self, wanted: &[String]) -> Result<Self> {
        let mut kept = Vec::with_capacity(wanted.len());
        let mut missing = 0usize;
        for gene in wanted {
            match self.gene_row(gene) {
                Some(row) => kept.push(row),
                None => missing += 1,
            }
        }
        if missing > 0 {
            warn!(
                "{} of {} requested genes are not in the expression matrix",
                missing,
                wanted.len()
            );
        }
        if kept.is_empty() {
            return Err(QcError::EmptyData(
                "no requested genes found in expression matrix".to_string(),
            ));
        }
        let gene_ids: Vec<String> = kept.iter().map(|&r| self.gene_ids[r].clone()).collect();
        let data = DMatrix::from_fn(kept.len(), self.n_samples(), |r, c| {
            self.data[(kept[r], c)]
        });
        Self::from_parts(data, gene_ids, self.sample_ids.clone())
    }

    /// Number of genes (rows).
    #[inline]
    pub fn n_genes(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Gene identifiers.
    #[inline]
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Normalized sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Row index of a gene.
    #[inline]
    pub fn gene_row(&self, gene_id: &str) -> Option<usize> {
        self.gene_index.get(gene_id).copied()
    }

    /// Column index of a normalized sample id.
    #[inline]
    pub fn sample_col(&self, sample_id: &str) -> Option<usize> {
        self.sample_index.get(sample_id).copied()
    }

    /// Value at (gene row, sample column).
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_matrix(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_from_csv_normalizes_columns() {
        let file = write_matrix(
            ",s1_read_count.tsv,s2_read_count.tsv\n\
             g1,1.5,2.0\n\
             g2,0.0,NA\n",
        );
        let matrix = ExpressionMatrix::from_csv(file.path()).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 2);
        assert_eq!(matrix.sample_ids(), ["s1", "s2"]);
        let g1 = matrix.gene_row("g1").unwrap();
        let s2 = matrix.sample_col("s2").unwrap();
        assert_relative_eq!(matrix.value(g1, s2), 2.0);
        let g2 = matrix.gene_row("g2").unwrap();
        assert!(matrix.value(g2, s2).is_nan());
    }

    #[test]
    fn test_from_csv_rejects_garbage_cells() {
        let file = write_matrix(",s1\ng1,abc\n");
        let err = ExpressionMatrix::from_csv(file.path()).unwrap_err();
        assert!(matches!(err, QcError::InvalidValue { value, .. } if value == "abc"));
    }

    #[test]
    fn test_duplicate_columns_after_normalization_rejected() {
        let file = write_matrix(",s1.fastq.gz,s1_read_count.tsv\ng1,1.0,2.0\n");
        assert!(ExpressionMatrix::from_csv(file.path()).is_err());
    }

    #[test]
    fn test_new_checks_dimensions() {
        let err = ExpressionMatrix::new(
            vec!["g1".to_string()],
            vec!["s1".to_string(), "s2".to_string()],
            vec![1.0],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QcError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_restrict_genes_keeps_list_order() {
        let matrix = ExpressionMatrix::new(
            vec!["g1".to_string(), "g2".to_string(), "g3".to_string()],
            vec!["s1".to_string()],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        let restricted = matrix
            .restrict_genes(&[
                "g3".to_string(),
                "missing".to_string(),
                "g1".to_string(),
            ])
            .unwrap();
        assert_eq!(restricted.gene_ids(), ["g3", "g1"]);
        assert_relative_eq!(restricted.value(0, 0), 3.0);
        assert_relative_eq!(restricted.value(1, 0), 1.0);
    }

    #[test]
    fn test_restrict_genes_empty_intersection_is_fatal() {
        let matrix = ExpressionMatrix::new(
            vec!["g1".to_string()],
            vec!["s1".to_string()],
            vec![1.0],
        )
        .unwrap();
        assert!(matrix.restrict_genes(&["nope".to_string()]).is_err());
    }
}
