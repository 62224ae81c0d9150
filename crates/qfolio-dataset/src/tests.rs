// Dataset store tests

#[cfg(test)]
mod tests {
    use crate::*;
    use chrono::NaiveDate;
    use qfolio_types::{AssetId, ErrorKind, PriceRow, ReturnKind};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn store() -> MemoryDataset {
        let rows = vec![
            PriceRow::new("AAA", day(1), 100.0),
            PriceRow::new("BBB", day(1), 50.0),
            PriceRow::new("AAA", day(2), 110.0),
            PriceRow::new("BBB", day(2), 45.0),
            PriceRow::new("AAA", day(5), 121.0),
            PriceRow::new("BBB", day(5), 45.0),
        ];
        MemoryDataset::with_rows("tech", rows)
    }

    #[test]
    fn test_returns_for_subset() {
        let s = store();
        let returns = s
            .return_series("tech", &[AssetId::new("AAA")], ReturnKind::Simple)
            .unwrap();

        assert_eq!(returns.num_assets(), 1);
        assert_eq!(returns.num_observations(), 2);
        assert!((returns.observations()[0][0] - 0.1).abs() < 1e-12);
        assert!((returns.observations()[1][0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_all_assets_when_unfiltered() {
        let s = store();
        assert_eq!(s.price_rows("tech", &[]).unwrap().len(), 6);
        let returns = s.return_series("tech", &[], ReturnKind::Log).unwrap();
        assert_eq!(returns.assets(), &[AssetId::new("AAA"), AssetId::new("BBB")]);
    }

    #[test]
    fn test_unknown_dataset_and_asset() {
        let s = store();
        assert_eq!(
            s.price_rows("energy", &[]).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            s.price_rows("tech", &[AssetId::new("CCC")]).unwrap_err().kind(),
            ErrorKind::AssetMismatch
        );
    }

    #[test]
    fn test_summary() {
        let summary = store().summary("tech").unwrap();
        assert_eq!(summary.num_rows, 6);
        assert_eq!(summary.num_assets, 2);
        assert_eq!(summary.first_date, Some(day(1)));
        assert_eq!(summary.last_date, Some(day(5)));
    }

    #[test]
    fn test_load_json_rows() {
        let json = r#"[
            {"asset_id": "X", "date": "2024-01-02", "adjusted_price": 10.0},
            {"asset_id": "X", "date": "2024-01-03", "adjusted_price": 11.0}
        ]"#;
        let mut s = MemoryDataset::new();
        assert_eq!(s.load_json("x", json.as_bytes()).unwrap(), 2);
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["x"]);

        let bad = MemoryDataset::new().load_json("y", "not json".as_bytes());
        assert_eq!(bad.unwrap_err().kind(), ErrorKind::Serialization);
    }
}
