//! Tests for migration requests

use super::*;

fn request() -> MigrationRequest {
    MigrationRequest::new("src", "shop", "dst", "shop", MigrationMode::Both)
}

mod mode_tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("schema".parse::<MigrationMode>().unwrap(), MigrationMode::SchemaOnly);
        assert_eq!("data".parse::<MigrationMode>().unwrap(), MigrationMode::DataOnly);
        assert_eq!(" Both ".parse::<MigrationMode>().unwrap(), MigrationMode::Both);
    }

    #[test]
    fn test_unknown_mode_is_invalid_request() {
        let err = "everything".parse::<MigrationMode>().unwrap_err();
        assert!(matches!(err, MigrationError::InvalidRequest(_)));
    }

    #[test]
    fn test_mode_flags() {
        assert!(MigrationMode::SchemaOnly.copies_schema());
        assert!(!MigrationMode::SchemaOnly.copies_data());
        assert!(!MigrationMode::DataOnly.copies_schema());
        assert!(MigrationMode::DataOnly.copies_data());
        assert!(MigrationMode::Both.copies_schema() && MigrationMode::Both.copies_data());
    }

    #[test]
    fn test_mode_serde_uses_short_names() {
        assert_eq!(serde_json::to_string(&MigrationMode::SchemaOnly).unwrap(), "\"schema\"");
        assert_eq!(serde_json::to_string(&MigrationMode::Both).unwrap(), "\"both\"");
        let mode: MigrationMode = serde_json::from_str("\"data\"").unwrap();
        assert_eq!(mode, MigrationMode::DataOnly);
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
        assert!(request().selects_all());
    }

    #[test]
    fn test_same_connection_different_database_is_valid() {
        let req = MigrationRequest::new("src", "shop", "src", "shop_copy", MigrationMode::Both);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_self_migration_rejected() {
        let req = MigrationRequest::new("src", "shop", "src", "shop", MigrationMode::DataOnly);
        assert!(matches!(req.validate(), Err(MigrationError::InvalidRequest(_))));
    }

    #[test]
    fn test_aliased_connections_are_the_same_database() {
        let req = MigrationRequest::new("prod", "shop", "0b6f", "shop", MigrationMode::Both);
        assert!(req.validate().is_ok());

        let aliases =
            |a: &str, b: &str| a == b || matches!((a, b), ("prod", "0b6f") | ("0b6f", "prod"));
        assert!(matches!(
            req.validate_with(aliases),
            Err(MigrationError::InvalidRequest(_))
        ));

        let req = MigrationRequest::new("prod", "shop", "0b6f", "shop_copy", MigrationMode::Both);
        assert!(req.validate_with(aliases).is_ok());
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut req = request();
        req.source_db = String::new();
        assert!(matches!(req.validate(), Err(MigrationError::InvalidRequest(_))));

        let mut req = request();
        req.target_db = "  ".into();
        assert!(matches!(req.validate(), Err(MigrationError::InvalidRequest(_))));

        let mut req = request();
        req.target_conn = String::new();
        assert!(matches!(req.validate(), Err(MigrationError::InvalidRequest(_))));
    }

    #[test]
    fn test_blank_table_name_rejected() {
        let req = request().with_tables(["orders", ""]);
        assert!(matches!(req.validate(), Err(MigrationError::InvalidRequest(_))));
    }
}
