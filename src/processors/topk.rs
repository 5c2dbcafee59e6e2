//! Top-k extraction from class probability rows.

/// Top-k class indexes and their scores for each row of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TopkResult {
    /// Class indexes per row, best first.
    pub indexes: Vec<Vec<usize>>,
    /// Scores matching `indexes`.
    pub scores: Vec<Vec<f32>>,
}

/// Extracts the top-k most confident classes from score rows.
///
/// Ties keep the lower class index first, so `k = 1` behaves like a first-maximum
/// arg-max.
#[derive(Debug, Clone, Copy)]
pub struct Topk {
    k: usize,
}

impl Topk {
    /// Creates a processor returning `k` classes per row.
    ///
    /// # Errors
    ///
    /// Returns an error if `k` is 0.
    pub fn new(k: usize) -> Result<Self, String> {
        if k == 0 {
            return Err("k must be greater than 0".to_string());
        }
        Ok(Self { k })
    }

    /// Arg-max processor (`k = 1`).
    pub fn argmax() -> Self {
        Self { k: 1 }
    }

    /// Returns the configured `k`.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Processes a batch of score rows.
    ///
    /// # Errors
    ///
    /// Returns an error if any row is empty.
    pub fn process(&self, rows: &[Vec<f32>]) -> Result<TopkResult, String> {
        let mut indexes = Vec::with_capacity(rows.len());
        let mut scores = Vec::with_capacity(rows.len());
        for row in rows {
            let (idx, sc) = self.process_single(row)?;
            indexes.push(idx);
            scores.push(sc);
        }
        Ok(TopkResult { indexes, scores })
    }

    /// Processes one score row into `(indexes, scores)`, best first.
    ///
    /// When the row has fewer than `k` classes every class is returned.
    pub fn process_single(&self, row: &[f32]) -> Result<(Vec<usize>, Vec<f32>), String> {
        if row.is_empty() {
            return Err("Empty prediction vector".to_string());
        }

        let mut indexed: Vec<(usize, f32)> = row.iter().copied().enumerate().collect();
        // Stable sort keeps the lower index first among equal scores
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(indexed.into_iter().take(self.k).unzip())
    }
}

impl Default for Topk {
    fn default() -> Self {
        Self::argmax()
    }
}
