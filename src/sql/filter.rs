//! Filter/order compilation for dynamic queries
//!
//! Parses `column.operator=value` query parameters plus `order`, `limit`
//! and `offset` into a parameterized WHERE/ORDER BY/LIMIT/OFFSET set.
//! Column names are checked against the live column catalog of the target
//! table or view before any SQL text is built; values are always bound.

/// Query operators accepted in `column.operator=value` parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    Like,
    Nlike,
    Between,
    Nbetween,
    Null,
}

impl FilterOperator {
    pub fn parse(token: &str) -> Result<Self, String> {
        match token {
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "in" => Ok(Self::In),
            "nin" => Ok(Self::Nin),
            "like" => Ok(Self::Like),
            "nlike" => Ok(Self::Nlike),
            "between" => Ok(Self::Between),
            "nbetween" => Ok(Self::Nbetween),
            "null" => Ok(Self::Null),
            other => Err(format!("'{}' is not a valid query operator", other)),
        }
    }

    /// SQL spelling for the simple binary operators
    fn sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::Nlike => "NOT LIKE",
            Self::In | Self::Nin | Self::Between | Self::Nbetween | Self::Null => {
                unreachable!("compound operators are rendered separately")
            }
        }
    }
}

/// One column of a table or view, as reported by the live catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogColumn {
    pub name: String,
    /// Formatted SQL type, e.g. "integer" or "character varying(255)"
    pub sql_type: String,
}

/// A value bound into the compiled query
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Single(String),
    List(Vec<String>),
}

/// Compiled WHERE/ORDER/LIMIT/OFFSET fragments plus bound values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    /// WHERE condition text without the WHERE keyword, clauses ANDed in
    /// input order
    pub where_clause: Option<String>,
    pub params: Vec<BoundValue>,
    /// ORDER BY text without the ORDER BY keyword
    pub order_by: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CompiledQuery {
    /// Render the full clause suffix for appending after a FROM/SET body
    pub fn render_suffix(&self) -> String {
        let mut sql = String::new();
        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        sql
    }
}

fn find_column<'a>(
    catalog: &'a [CatalogColumn],
    name: &str,
) -> Result<&'a CatalogColumn, String> {
    catalog
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| format!("'{}' is not a column of the queried object", name))
}

/// Compile query parameters against a live column catalog.
///
/// `query_params` preserves arrival order; a repeated key is ambiguous and
/// rejected outright. `param_offset` is the number of placeholders the
/// caller has already used in the surrounding statement.
pub fn compile_query(
    query_params: &[(String, String)],
    catalog: &[CatalogColumn],
    param_offset: usize,
) -> Result<CompiledQuery, String> {
    for (i, (key, _)) in query_params.iter().enumerate() {
        if query_params.iter().skip(i + 1).any(|(other, _)| other == key) {
            return Err(format!("query parameter '{}' appears more than once", key));
        }
    }

    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<BoundValue> = Vec::new();
    let mut order_by = None;
    let mut limit = None;
    let mut offset = None;
    let mut next_param = param_offset + 1;

    for (key, value) in query_params {
        match key.as_str() {
            "order" => {
                order_by = Some(compile_order(value, catalog)?);
            }
            "limit" => {
                let n: i64 = value
                    .parse()
                    .map_err(|_| format!("limit '{}' is not an integer", value))?;
                if n < -1 {
                    return Err(format!("limit must be non-negative or -1, got {}", n));
                }
                // -1 means unlimited, same as omitting the parameter
                if n != -1 {
                    limit = Some(n);
                }
            }
            "offset" => {
                let n: i64 = value
                    .parse()
                    .map_err(|_| format!("offset '{}' is not an integer", value))?;
                if n < 0 {
                    return Err(format!("offset must be non-negative, got {}", n));
                }
                offset = Some(n);
            }
            _ => {
                let (column, op_token) = key.rsplit_once('.').ok_or_else(|| {
                    format!(
                        "query parameter '{}' is not of the form column.operator",
                        key
                    )
                })?;
                let op = FilterOperator::parse(op_token)?;
                let col = find_column(catalog, column)?;
                clauses.push(compile_clause(col, op, value, &mut params, &mut next_param)?);
            }
        }
    }

    Ok(CompiledQuery {
        where_clause: if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        },
        params,
        order_by,
        limit,
        offset,
    })
}

fn compile_clause(
    col: &CatalogColumn,
    op: FilterOperator,
    value: &str,
    params: &mut Vec<BoundValue>,
    next_param: &mut usize,
) -> Result<String, String> {
    match op {
        FilterOperator::Null => match value.to_lowercase().as_str() {
            "true" => Ok(format!("{} IS NULL", col.name)),
            "false" => Ok(format!("{} IS NOT NULL", col.name)),
            other => Err(format!(
                "the null operator takes true or false, got '{}'",
                other
            )),
        },
        FilterOperator::Between | FilterOperator::Nbetween => {
            let parts: Vec<&str> = value.split(',').collect();
            if parts.len() != 2 {
                return Err(format!(
                    "the {} operator takes exactly two comma-separated values, got '{}'",
                    if op == FilterOperator::Between { "between" } else { "nbetween" },
                    value
                ));
            }
            params.push(BoundValue::Single(parts[0].to_string()));
            params.push(BoundValue::Single(parts[1].to_string()));
            let clause = format!(
                "{} {}BETWEEN ${}::{} AND ${}::{}",
                col.name,
                if op == FilterOperator::Nbetween { "NOT " } else { "" },
                *next_param,
                col.sql_type,
                *next_param + 1,
                col.sql_type
            );
            *next_param += 2;
            Ok(clause)
        }
        FilterOperator::In | FilterOperator::Nin => {
            let items: Vec<String> = value.split(',').map(str::to_string).collect();
            params.push(BoundValue::List(items));
            let clause = if op == FilterOperator::In {
                format!("{} = ANY(${}::{}[])", col.name, *next_param, col.sql_type)
            } else {
                format!(
                    "NOT ({} = ANY(${}::{}[]))",
                    col.name, *next_param, col.sql_type
                )
            };
            *next_param += 1;
            Ok(clause)
        }
        FilterOperator::Like | FilterOperator::Nlike => {
            params.push(BoundValue::Single(value.to_string()));
            let clause = format!("{} {} ${}", col.name, op.sql(), *next_param);
            *next_param += 1;
            Ok(clause)
        }
        _ => {
            params.push(BoundValue::Single(value.to_string()));
            let clause = format!(
                "{} {} ${}::{}",
                col.name,
                op.sql(),
                *next_param,
                col.sql_type
            );
            *next_param += 1;
            Ok(clause)
        }
    }
}

/// Compile `order=column[,ASC|DESC]`.
///
/// Omitted direction emits no token, which PostgreSQL treats as ascending.
fn compile_order(value: &str, catalog: &[CatalogColumn]) -> Result<String, String> {
    let parts: Vec<&str> = value.split(',').collect();
    match parts.as_slice() {
        [column] => {
            let col = find_column(catalog, column.trim())?;
            Ok(col.name.clone())
        }
        [column, direction] => {
            let col = find_column(catalog, column.trim())?;
            let dir = direction.trim().to_uppercase();
            if dir != "ASC" && dir != "DESC" {
                return Err(format!(
                    "order direction must be ASC or DESC, got '{}'",
                    direction
                ));
            }
            Ok(format!("{} {}", col.name, dir))
        }
        _ => Err(format!(
            "order takes a column and an optional direction, got '{}'",
            value
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<CatalogColumn> {
        vec![
            CatalogColumn {
                name: "widgets_id".to_string(),
                sql_type: "integer".to_string(),
            },
            CatalogColumn {
                name: "col_one".to_string(),
                sql_type: "character varying(255)".to_string(),
            },
            CatalogColumn {
                name: "col_three".to_string(),
                sql_type: "integer".to_string(),
            },
        ]
    }

    fn qp(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ==================== Operator Parsing ====================

    #[test]
    fn test_operator_parse() {
        assert_eq!(FilterOperator::parse("eq"), Ok(FilterOperator::Eq));
        assert_eq!(FilterOperator::parse("nbetween"), Ok(FilterOperator::Nbetween));
        assert!(FilterOperator::parse("equals").is_err());
        assert!(FilterOperator::parse("EQ").is_err());
    }

    // ==================== Simple Clauses ====================

    #[test]
    fn test_compile_eq() {
        let compiled = compile_query(&qp(&[("col_three.eq", "80")]), &catalog(), 0).unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("col_three = $1::integer")
        );
        assert_eq!(compiled.params, vec![BoundValue::Single("80".to_string())]);
    }

    #[test]
    fn test_compile_comparisons() {
        let compiled = compile_query(
            &qp(&[("col_three.gte", "80"), ("col_three.lt", "95")]),
            &catalog(),
            0,
        )
        .unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("col_three >= $1::integer AND col_three < $2::integer")
        );
        assert_eq!(compiled.params.len(), 2);
    }

    #[test]
    fn test_compile_neq_spelling() {
        let compiled = compile_query(&qp(&[("col_one.neq", "x")]), &catalog(), 0).unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("col_one != $1::character varying(255)")
        );
    }

    #[test]
    fn test_compile_like() {
        let compiled = compile_query(&qp(&[("col_one.like", "he%")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.where_clause.as_deref(), Some("col_one LIKE $1"));

        let compiled = compile_query(&qp(&[("col_one.nlike", "he%")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.where_clause.as_deref(), Some("col_one NOT LIKE $1"));
    }

    // ==================== Null Operator ====================

    #[test]
    fn test_compile_null() {
        let compiled = compile_query(&qp(&[("col_one.null", "true")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.where_clause.as_deref(), Some("col_one IS NULL"));
        assert!(compiled.params.is_empty());

        let compiled = compile_query(&qp(&[("col_one.null", "FALSE")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.where_clause.as_deref(), Some("col_one IS NOT NULL"));
    }

    #[test]
    fn test_compile_null_bad_value() {
        let result = compile_query(&qp(&[("col_one.null", "maybe")]), &catalog(), 0);
        assert!(result.is_err());
    }

    // ==================== Between ====================

    #[test]
    fn test_compile_between() {
        let compiled =
            compile_query(&qp(&[("col_three.between", "80,95")]), &catalog(), 0).unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("col_three BETWEEN $1::integer AND $2::integer")
        );
        assert_eq!(
            compiled.params,
            vec![
                BoundValue::Single("80".to_string()),
                BoundValue::Single("95".to_string())
            ]
        );
    }

    #[test]
    fn test_compile_nbetween() {
        let compiled =
            compile_query(&qp(&[("col_three.nbetween", "80,95")]), &catalog(), 0).unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("col_three NOT BETWEEN $1::integer AND $2::integer")
        );
    }

    #[test]
    fn test_compile_between_wrong_arity() {
        assert!(compile_query(&qp(&[("col_three.between", "80")]), &catalog(), 0).is_err());
        assert!(compile_query(&qp(&[("col_three.between", "80,90,95")]), &catalog(), 0).is_err());
    }

    // ==================== In / Nin ====================

    #[test]
    fn test_compile_in() {
        let compiled = compile_query(&qp(&[("col_three.in", "80,90,95")]), &catalog(), 0).unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("col_three = ANY($1::integer[])")
        );
        assert_eq!(
            compiled.params,
            vec![BoundValue::List(vec![
                "80".to_string(),
                "90".to_string(),
                "95".to_string()
            ])]
        );
    }

    #[test]
    fn test_compile_nin() {
        let compiled = compile_query(&qp(&[("col_one.nin", "a,b")]), &catalog(), 0).unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("NOT (col_one = ANY($1::character varying(255)[]))")
        );
    }

    // ==================== Column Validation ====================

    #[test]
    fn test_unknown_column_rejected() {
        let result = compile_query(&qp(&[("ghost_col.eq", "1")]), &catalog(), 0);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("ghost_col"));
    }

    #[test]
    fn test_malformed_key_rejected() {
        let result = compile_query(&qp(&[("col_one", "1")]), &catalog(), 0);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("column.operator"));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = compile_query(
            &qp(&[("col_three.eq", "80"), ("col_three.eq", "90")]),
            &catalog(),
            0,
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("more than once"));
    }

    // ==================== Clause Ordering ====================

    #[test]
    fn test_clauses_anded_in_input_order() {
        let compiled = compile_query(
            &qp(&[
                ("col_one.eq", "hello"),
                ("col_three.gt", "50"),
                ("col_one.null", "false"),
            ]),
            &catalog(),
            0,
        )
        .unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some(
                "col_one = $1::character varying(255) AND col_three > $2::integer AND col_one IS NOT NULL"
            )
        );
    }

    #[test]
    fn test_param_offset_respected() {
        let compiled = compile_query(&qp(&[("col_three.eq", "80")]), &catalog(), 3).unwrap();
        assert_eq!(
            compiled.where_clause.as_deref(),
            Some("col_three = $4::integer")
        );
    }

    // ==================== Order ====================

    #[test]
    fn test_order_plain() {
        let compiled = compile_query(&qp(&[("order", "col_three")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.order_by.as_deref(), Some("col_three"));
    }

    #[test]
    fn test_order_with_direction() {
        let compiled = compile_query(&qp(&[("order", "col_three,DESC")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.order_by.as_deref(), Some("col_three DESC"));

        let compiled = compile_query(&qp(&[("order", "col_three,asc")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.order_by.as_deref(), Some("col_three ASC"));
    }

    #[test]
    fn test_order_invalid() {
        assert!(compile_query(&qp(&[("order", "col_three,UP")]), &catalog(), 0).is_err());
        assert!(compile_query(&qp(&[("order", "a,ASC,extra")]), &catalog(), 0).is_err());
        assert!(compile_query(&qp(&[("order", "ghost_col")]), &catalog(), 0).is_err());
    }

    // ==================== Limit / Offset ====================

    #[test]
    fn test_limit_and_offset() {
        let compiled = compile_query(
            &qp(&[("limit", "10"), ("offset", "20")]),
            &catalog(),
            0,
        )
        .unwrap();
        assert_eq!(compiled.limit, Some(10));
        assert_eq!(compiled.offset, Some(20));
    }

    #[test]
    fn test_limit_minus_one_means_unlimited() {
        let compiled = compile_query(&qp(&[("limit", "-1")]), &catalog(), 0).unwrap();
        assert_eq!(compiled.limit, None);
    }

    #[test]
    fn test_limit_invalid() {
        assert!(compile_query(&qp(&[("limit", "ten")]), &catalog(), 0).is_err());
        assert!(compile_query(&qp(&[("limit", "-2")]), &catalog(), 0).is_err());
        assert!(compile_query(&qp(&[("offset", "-1")]), &catalog(), 0).is_err());
    }

    #[test]
    fn test_missing_limit_omits_clause() {
        let compiled = compile_query(&qp(&[]), &catalog(), 0).unwrap();
        assert_eq!(compiled.limit, None);
        assert_eq!(compiled.offset, None);
        assert_eq!(compiled.where_clause, None);
        assert_eq!(compiled.render_suffix(), "");
    }

    // ==================== Rendered Suffix ====================

    #[test]
    fn test_render_suffix_full() {
        let compiled = compile_query(
            &qp(&[
                ("col_three.gte", "80"),
                ("order", "col_three,DESC"),
                ("limit", "5"),
                ("offset", "2"),
            ]),
            &catalog(),
            0,
        )
        .unwrap();
        assert_eq!(
            compiled.render_suffix(),
            " WHERE col_three >= $1::integer ORDER BY col_three DESC LIMIT 5 OFFSET 2"
        );
    }
}
