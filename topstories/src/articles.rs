use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical story record, independent of the upstream schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub heading: String,
    /// Short permalink. Also the key for suffix lookups.
    pub link: String,
    pub updated: DateTime<Utc>,
}

impl Article {
    /// UTC calendar date of the last update.
    pub fn updated_date(&self) -> NaiveDate {
        self.updated.date_naive()
    }
}

/// Number of articles sharing one UTC calendar date.
/// `date` serializes as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBucket {
    pub date: NaiveDate,
    pub total: usize,
}

/// Partition articles by the UTC date of `updated`.
///
/// Buckets come out in the order their date is first seen in `articles`; no sorting.
pub fn group_by_date(articles: &[Article]) -> Vec<DateBucket> {
    let mut buckets: Vec<DateBucket> = Vec::new();
    let mut positions: HashMap<NaiveDate, usize> = HashMap::new();

    for article in articles {
        let date = article.updated_date();
        match positions.get(&date) {
            Some(&idx) => buckets[idx].total += 1,
            None => {
                positions.insert(date, buckets.len());
                buckets.push(DateBucket { date, total: 1 });
            }
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(link: &str, updated: &str) -> Article {
        Article {
            heading: format!("heading {}", link),
            link: link.to_string(),
            updated: updated.parse().expect("valid timestamp"),
        }
    }

    #[test]
    fn groups_in_first_occurrence_order() {
        let articles = vec![
            article("a", "2020-07-26T09:21:19Z"),
            article("b", "2020-07-24T09:21:19Z"),
            article("c", "2020-07-22T09:21:19Z"),
            article("d", "2020-07-22T10:00:00Z"),
        ];

        let buckets = group_by_date(&articles);
        let got: Vec<(String, usize)> = buckets
            .iter()
            .map(|b| (b.date.format("%Y-%m-%d").to_string(), b.total))
            .collect();
        assert_eq!(
            got,
            vec![
                ("2020-07-26".to_string(), 1),
                ("2020-07-24".to_string(), 1),
                ("2020-07-22".to_string(), 2),
            ]
        );
    }

    #[test]
    fn order_is_not_chronological() {
        let articles = vec![
            article("a", "2020-07-22T09:00:00Z"),
            article("b", "2020-07-26T09:00:00Z"),
            article("c", "2020-07-22T11:00:00Z"),
        ];

        let buckets = group_by_date(&articles);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].date, NaiveDate::from_ymd_opt(2020, 7, 22).unwrap());
        assert_eq!(buckets[0].total, 2);
        assert_eq!(buckets[1].date, NaiveDate::from_ymd_opt(2020, 7, 26).unwrap());
    }

    #[test]
    fn midnight_splits_buckets() {
        let across = vec![
            article("a", "2020-07-22T23:59:00Z"),
            article("b", "2020-07-23T00:01:00Z"),
        ];
        assert_eq!(group_by_date(&across).len(), 2);

        let same_day = vec![
            article("a", "2020-07-22T00:30:00Z"),
            article("b", "2020-07-22T12:30:00Z"),
        ];
        let buckets = group_by_date(&same_day);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].total, 2);
    }

    #[test]
    fn totals_partition_input() {
        let articles: Vec<Article> = (0..17)
            .map(|i| article(&format!("l{}", i), &format!("2020-07-{:02}T0{}:00:00Z", 10 + i % 5, i % 10)))
            .collect();

        let buckets = group_by_date(&articles);
        assert_eq!(buckets.iter().map(|b| b.total).sum::<usize>(), articles.len());
        assert_eq!(buckets.len(), 5);
    }

    #[test]
    fn empty_input_gives_no_buckets() {
        assert!(group_by_date(&[]).is_empty());
    }

    #[test]
    fn json_shape() {
        let a = article("https://nyti.ms/2OZOvs8", "2020-07-26T13:21:19Z");
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["heading"], "heading https://nyti.ms/2OZOvs8");
        assert_eq!(value["link"], "https://nyti.ms/2OZOvs8");
        assert_eq!(value["updated"], "2020-07-26T13:21:19Z");

        let bucket = DateBucket {
            date: NaiveDate::from_ymd_opt(2020, 7, 26).unwrap(),
            total: 3,
        };
        assert_eq!(
            serde_json::to_string(&bucket).unwrap(),
            r#"{"date":"2020-07-26","total":3}"#
        );
    }
}
