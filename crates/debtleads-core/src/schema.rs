/// Arrow schema definitions for the debtor and installment-plan report tables.
///
/// Raw input tables keep whatever column names the source file carries
/// (see [`crate::ColumnMap`]); the report tables below always use these
/// canonical names.
pub mod debt {
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::amount::SCALE;

    pub const TAXPAYER_ID: &str = "taxpayer_id";
    pub const DEBTOR_NAME: &str = "debtor_name";
    pub const JURISDICTION: &str = "jurisdiction";
    pub const TOTAL_DEBT: &str = "total_debt";

    /// Arrow type for raw per-debt amounts after coercion.
    pub const AMOUNT_TYPE: DataType = DataType::Decimal128(38, SCALE);

    pub fn debtor_fields() -> Vec<Field> {
        vec![
            Field::new(TAXPAYER_ID, DataType::Utf8, false),
            Field::new(DEBTOR_NAME, DataType::Utf8, false),
            Field::new(JURISDICTION, DataType::Utf8, false),
            Field::new(TOTAL_DEBT, DataType::Float64, false),
        ]
    }

    /// Schema for the aggregated (one row per debtor) report.
    pub fn aggregated_schema() -> Schema {
        Schema::new(debtor_fields())
    }
}

/// Installment-plan columns: canonical names and report schemas.
pub mod plan {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::debt;

    pub const NEGOTIATION_TYPE: &str = "negotiation_type";
    pub const MODALITY: &str = "modality";
    pub const STATUS: &str = "status";
    pub const INSTALLMENTS_GRANTED: &str = "installments_granted";
    pub const INSTALLMENTS_OVERDUE: &str = "installments_overdue";
    pub const CONSOLIDATED_VALUE: &str = "consolidated_value";
    pub const PRINCIPAL_VALUE: &str = "principal_value";
    pub const PENALTY_VALUE: &str = "penalty_value";
    pub const INTEREST_VALUE: &str = "interest_value";
    pub const LEGAL_CHARGE_VALUE: &str = "legal_charge_value";

    pub const HAS_PLAN: &str = "has_plan";
    pub const NEGOTIATION_COUNT: &str = "negotiation_count";

    /// The negotiation attributes retained from a plan table, in report order.
    pub const NEGOTIATION_FIELDS: [&str; 10] = [
        NEGOTIATION_TYPE,
        MODALITY,
        STATUS,
        INSTALLMENTS_GRANTED,
        INSTALLMENTS_OVERDUE,
        CONSOLIDATED_VALUE,
        PRINCIPAL_VALUE,
        PENALTY_VALUE,
        INTEREST_VALUE,
        LEGAL_CHARGE_VALUE,
    ];

    fn negotiation_fields() -> impl Iterator<Item = Field> {
        NEGOTIATION_FIELDS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
    }

    /// Schema for the row-level "matched" report: debtor columns then plan columns.
    pub fn matched_schema() -> Schema {
        let mut fields = debt::debtor_fields();
        fields.extend(negotiation_fields());
        Schema::new(fields)
    }

    /// Schema for the summarized report: one row per debtor with a plan flag.
    pub fn annotated_schema() -> Schema {
        let mut fields = debt::debtor_fields();
        fields.push(Field::new(HAS_PLAN, DataType::Boolean, false));
        fields.push(Field::new(NEGOTIATION_COUNT, DataType::UInt64, false));
        fields.extend(negotiation_fields());
        Schema::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::{debt, plan};

    #[test]
    fn aggregated_schema_has_expected_fields() {
        let schema = debt::aggregated_schema();
        assert_eq!(schema.fields().len(), 4);
        assert!(schema.field_with_name(debt::TAXPAYER_ID).is_ok());
        assert!(schema.field_with_name(debt::TOTAL_DEBT).is_ok());
    }

    #[test]
    fn matched_schema_has_expected_fields() {
        let schema = plan::matched_schema();
        assert_eq!(schema.fields().len(), 14);
        assert!(schema.field_with_name(plan::LEGAL_CHARGE_VALUE).is_ok());
        assert_eq!(schema.field(0).name(), debt::TAXPAYER_ID);
    }

    #[test]
    fn annotated_schema_has_flag_and_count() {
        let schema = plan::annotated_schema();
        assert_eq!(schema.fields().len(), 16);
        assert!(schema.field_with_name(plan::HAS_PLAN).is_ok());
        assert!(schema.field_with_name(plan::NEGOTIATION_COUNT).is_ok());
    }
}
