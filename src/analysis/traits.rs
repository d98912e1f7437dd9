use std::collections::BTreeMap;

use statrs::statistics::Statistics;

/// give an array of data, return each filed's mean, std, max
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use cim_sim::analysis::traits::{ReportStats, get_mean_std_max};
///
/// #[derive(Debug)]
/// struct Data {
///   latency: f64,
///   energy: f64,
/// }
/// impl ReportStats for Data {
///    fn report_stats(data_vec: &[Self]) -> BTreeMap<String, (f64, f64, f64)> {
///       let mut res = BTreeMap::new();
///       res.insert("latency".to_string(), get_mean_std_max(data_vec, |x| x.latency));
///       res.insert("energy".to_string(), get_mean_std_max(data_vec, |x| x.energy));
///       res
///  }
/// }
/// let data = vec![Data { latency: 1.0, energy: 2.0 }, Data { latency: 2.0, energy: 3.0 }];
/// let res = Data::report_stats(&data);
/// assert_eq!(res["latency"], (1.5, 0.5, 2.0));
/// assert_eq!(res["energy"], (2.5, 0.5, 3.0));
/// ```
pub trait ReportStats: Sized {
    fn report_stats(data_vec: &[Self]) -> BTreeMap<String, (f64, f64, f64)>;
}

/// mean, population std and max of one field, all zero for an empty slice
pub fn get_mean_std_max<T>(data: &[T], mapper: impl Fn(&T) -> f64) -> (f64, f64, f64) {
    let values: Vec<f64> = data.iter().map(mapper).collect();
    get_mean_std_max_from_iter(values)
}

pub fn get_mean_std_max_from_iter(data: impl IntoIterator<Item = f64> + Clone) -> (f64, f64, f64) {
    if data.clone().into_iter().next().is_none() {
        return (0.0, 0.0, 0.0);
    }
    let mean = data.clone().into_iter().mean();
    let std = data.clone().into_iter().population_std_dev();
    let max = data.into_iter().fold(f64::MIN, f64::max);
    (mean, std, max)
}
