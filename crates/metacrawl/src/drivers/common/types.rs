//! Rendering of dialect type names with length, precision and scale suffixes.
//!
//! Catalog views report a bare type name plus separate length/precision
//! columns. Each dialect combines them differently; the renderers here
//! produce strings like `varchar(255)`, `decimal(10,2)` or `datetime2(3)`.
//! When the precision information is missing the bare name is returned.

/// Raw type attributes as read from a catalog view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawColumnType {
    pub data_type: String,
    pub char_length: Option<i64>,
    pub data_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub datetime_precision: Option<i64>,
}

impl RawColumnType {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            ..Default::default()
        }
    }
}

/// MySQL and StarRocks (`INFORMATION_SCHEMA.COLUMNS`).
pub fn render_mysql(raw: &RawColumnType) -> String {
    let base = raw.data_type.to_lowercase();
    match base.as_str() {
        "varchar" | "char" | "varbinary" | "binary" => with_length(&base, raw.char_length),
        "decimal" | "numeric" => with_precision_scale(&base, raw.numeric_precision, raw.numeric_scale),
        "datetime" | "timestamp" | "time" => match raw.datetime_precision {
            Some(p) if p > 0 => format!("{}({})", base, p),
            _ => base,
        },
        _ => base,
    }
}

/// PostgreSQL (`information_schema.columns`).
pub fn render_postgres(raw: &RawColumnType) -> String {
    let base = raw.data_type.to_lowercase();
    match base.as_str() {
        "character varying" | "character" | "bit" | "bit varying" => {
            with_length(&base, raw.char_length)
        }
        "numeric" => with_precision_scale(&base, raw.numeric_precision, raw.numeric_scale),
        _ => base,
    }
}

/// SQL Server (`INFORMATION_SCHEMA.COLUMNS`). A length of -1 means `(max)`.
pub fn render_mssql(raw: &RawColumnType) -> String {
    let base = raw.data_type.to_lowercase();
    match base.as_str() {
        "varchar" | "char" | "nvarchar" | "nchar" | "binary" | "varbinary" => {
            match raw.char_length {
                Some(-1) => format!("{}(max)", base),
                len => with_length(&base, len),
            }
        }
        "decimal" | "numeric" => match raw.numeric_precision {
            Some(p) => format!("{}({},{})", base, p, raw.numeric_scale.unwrap_or(0)),
            None => base,
        },
        "float" => match raw.numeric_precision {
            Some(p) => format!("{}({})", base, p),
            None => base,
        },
        "datetime2" | "datetimeoffset" | "time" => match raw.datetime_precision {
            Some(p) => format!("{}({})", base, p),
            None => base,
        },
        _ => base,
    }
}

/// Oracle (`user_tab_columns`).
pub fn render_oracle(raw: &RawColumnType) -> String {
    let base = raw.data_type.to_lowercase();
    match base.as_str() {
        "varchar2" | "char" | "nvarchar2" | "nchar" => {
            let length = raw.char_length.filter(|l| *l > 0).or(raw.data_length);
            with_length(&base, length)
        }
        "number" => match (raw.numeric_precision, raw.numeric_scale) {
            (Some(p), Some(s)) if p > 0 && s > 0 => format!("{}({},{})", base, p, s),
            (Some(p), _) if p > 0 => format!("{}({})", base, p),
            _ => base,
        },
        "raw" | "float" => with_length(&base, raw.data_length),
        _ => base,
    }
}

fn with_length(base: &str, length: Option<i64>) -> String {
    match length {
        Some(len) if len > 0 => format!("{}({})", base, len),
        _ => base.to_string(),
    }
}

fn with_precision_scale(base: &str, precision: Option<i64>, scale: Option<i64>) -> String {
    match (precision, scale) {
        (Some(p), Some(s)) => format!("{}({},{})", base, p, s),
        (Some(p), None) => format!("{}({})", base, p),
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(data_type: &str) -> RawColumnType {
        RawColumnType::new(data_type)
    }

    #[test]
    fn test_mysql_types() {
        let mut t = raw("varchar");
        t.char_length = Some(255);
        assert_eq!(render_mysql(&t), "varchar(255)");

        let mut t = raw("decimal");
        t.numeric_precision = Some(10);
        t.numeric_scale = Some(2);
        assert_eq!(render_mysql(&t), "decimal(10,2)");

        let mut t = raw("datetime");
        t.datetime_precision = Some(0);
        assert_eq!(render_mysql(&t), "datetime");
        t.datetime_precision = Some(6);
        assert_eq!(render_mysql(&t), "datetime(6)");

        assert_eq!(render_mysql(&raw("INT")), "int");
    }

    #[test]
    fn test_postgres_types() {
        let mut t = raw("character varying");
        t.char_length = Some(64);
        assert_eq!(render_postgres(&t), "character varying(64)");
        assert_eq!(render_postgres(&raw("character varying")), "character varying");

        let mut t = raw("numeric");
        t.numeric_precision = Some(12);
        t.numeric_scale = Some(4);
        assert_eq!(render_postgres(&t), "numeric(12,4)");
        assert_eq!(render_postgres(&raw("numeric")), "numeric");
    }

    #[test]
    fn test_mssql_types() {
        let mut t = raw("nvarchar");
        t.char_length = Some(-1);
        assert_eq!(render_mssql(&t), "nvarchar(max)");
        t.char_length = Some(50);
        assert_eq!(render_mssql(&t), "nvarchar(50)");

        let mut t = raw("decimal");
        t.numeric_precision = Some(18);
        assert_eq!(render_mssql(&t), "decimal(18,0)");

        let mut t = raw("float");
        t.numeric_precision = Some(53);
        assert_eq!(render_mssql(&t), "float(53)");

        let mut t = raw("datetime2");
        t.datetime_precision = Some(3);
        assert_eq!(render_mssql(&t), "datetime2(3)");

        assert_eq!(render_mssql(&raw("uniqueidentifier")), "uniqueidentifier");
    }

    #[test]
    fn test_oracle_types() {
        let mut t = raw("VARCHAR2");
        t.char_length = Some(100);
        t.data_length = Some(400);
        assert_eq!(render_oracle(&t), "varchar2(100)");

        t.char_length = Some(0);
        assert_eq!(render_oracle(&t), "varchar2(400)");

        let mut t = raw("NUMBER");
        t.numeric_precision = Some(10);
        t.numeric_scale = Some(2);
        assert_eq!(render_oracle(&t), "number(10,2)");
        t.numeric_scale = Some(0);
        assert_eq!(render_oracle(&t), "number(10)");
        t.numeric_precision = None;
        assert_eq!(render_oracle(&t), "number");

        let mut t = raw("RAW");
        t.data_length = Some(16);
        assert_eq!(render_oracle(&t), "raw(16)");

        assert_eq!(render_oracle(&raw("DATE")), "date");
    }
}
