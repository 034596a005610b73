use oxrdf::NamedNode;

use crate::{DataValue, KleioError, KleioResult};

/// A set of co-timestamped data columns, ordered ascending by time when
/// returned from storage reads.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries<T> {
    times: Vec<T>,
    columns: Vec<(NamedNode, Vec<DataValue>)>,
}

impl<T> TimeSeries<T> {
    /// Build a series from a time column and one value column per data IRI.
    /// Every value column must have the same length as the time column.
    pub fn new(times: Vec<T>, columns: Vec<(NamedNode, Vec<DataValue>)>) -> KleioResult<Self> {
        for (iri, values) in &columns {
            if values.len() != times.len() {
                return Err(KleioError::precondition(format!(
                    "column <{}> has {} values but {} time steps",
                    iri.as_str(),
                    values.len(),
                    times.len()
                )));
            }
        }
        Ok(Self { times, columns })
    }

    /// A series with the given columns and no rows yet.
    pub fn empty(data_iris: Vec<NamedNode>) -> Self {
        Self {
            times: Vec::new(),
            columns: data_iris
                .into_iter()
                .map(|iri| (iri, Vec::new()))
                .collect(),
        }
    }

    /// Append one row; `values` follow the column order of the series.
    pub fn push_row(&mut self, time: T, values: Vec<DataValue>) -> KleioResult<()> {
        if values.len() != self.columns.len() {
            return Err(KleioError::precondition(format!(
                "row has {} values but series has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.times.push(time);
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.1.push(value);
        }
        Ok(())
    }

    pub fn times(&self) -> &[T] {
        &self.times
    }

    pub fn data_iris(&self) -> Vec<&NamedNode> {
        self.columns.iter().map(|(iri, _)| iri).collect()
    }

    pub fn columns(&self) -> &[(NamedNode, Vec<DataValue>)] {
        &self.columns
    }

    pub fn values(&self, data_iri: &NamedNode) -> Option<&[DataValue]> {
        self.columns
            .iter()
            .find(|(iri, _)| iri == data_iri)
            .map(|(_, values)| values.as_slice())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(value: &str) -> NamedNode {
        NamedNode::new(value).expect("valid iri")
    }

    #[test]
    fn rejects_ragged_columns() {
        let result = TimeSeries::new(
            vec![1_i64, 2],
            vec![(iri("http://a"), vec![DataValue::from(1.0)])],
        );
        assert!(matches!(result, Err(KleioError::Precondition { .. })));
    }

    #[test]
    fn push_row_appends_to_every_column() {
        let mut series = TimeSeries::empty(vec![iri("http://a"), iri("http://b")]);
        series
            .push_row(1_i64, vec![DataValue::from(1.0), DataValue::from(10_i64)])
            .expect("push");
        assert_eq!(series.len(), 1);
        assert_eq!(
            series.values(&iri("http://b")),
            Some(&[DataValue::from(10_i64)][..])
        );
    }
}
