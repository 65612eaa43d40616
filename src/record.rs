//! Trace record parsing.
//!
//! One record per participant: the first fields carry participant metadata
//! and are skipped, every following field is a waypoint ID. Spreadsheet
//! exports leave stray quotes on numbers (`"7`, `7"`) and repeat the column
//! label (`Route`) inside rows, so both are tolerated.

use crate::error::ParseError;
use crate::{Route, TraceConfig, WaypointId};

/// Parses raw trace lines into routes.
#[derive(Debug, Clone)]
pub struct RecordParser {
    delimiter: char,
    reserved_fields: usize,
    header_token: String,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(&TraceConfig::default())
    }
}

impl RecordParser {
    pub fn new(config: &TraceConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            reserved_fields: config.reserved_fields,
            header_token: config.header_token.clone(),
        }
    }

    /// Parse one record into the ordered waypoint IDs it visits.
    ///
    /// A record with no fields past the reserved ones (a blank line included)
    /// is an empty route, not an error.
    ///
    /// # Example
    /// ```
    /// use trajectory_analysis::RecordParser;
    ///
    /// let parser = RecordParser::default();
    /// let route = parser.parse("P01,Group A,Route,\"3,5,8\"").unwrap();
    /// assert_eq!(route, vec![3, 5, 8]);
    /// ```
    pub fn parse(&self, line: &str) -> Result<Route, ParseError> {
        let mut route = Route::new();

        for (field, token) in line
            .split(self.delimiter)
            .enumerate()
            .skip(self.reserved_fields)
        {
            if let Some(id) = self.parse_token(field, token)? {
                route.push(id);
            }
        }

        Ok(route)
    }

    /// Parse a single field. `Ok(None)` means the field is the header token.
    fn parse_token(&self, field: usize, token: &str) -> Result<Option<WaypointId>, ParseError> {
        if token.trim() == self.header_token {
            return Ok(None);
        }

        let unquoted = token.strip_prefix('"').unwrap_or(token);
        let unquoted = unquoted.strip_suffix('"').unwrap_or(unquoted);

        unquoted
            .trim()
            .parse::<WaypointId>()
            .map(Some)
            .map_err(|_| ParseError::MalformedToken {
                field,
                token: token.to_string(),
            })
    }
}

/// Parse a record with the default layout (comma delimited, two reserved
/// fields, `Route` header token).
pub fn parse_record(line: &str) -> Result<Route, ParseError> {
    RecordParser::default().parse(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parser: &RecordParser, fields: &[&str]) -> Vec<Result<Option<WaypointId>, ParseError>> {
        fields
            .iter()
            .enumerate()
            .map(|(i, t)| parser.parse_token(i, t))
            .collect()
    }

    #[test]
    fn test_quote_handling() {
        let parser = RecordParser::default();
        let parsed = tokens(&parser, &["\"7", "7\"", "7", "Route"]);
        assert_eq!(parsed, vec![Ok(Some(7)), Ok(Some(7)), Ok(Some(7)), Ok(None)]);
    }

    #[test]
    fn test_fully_quoted_token() {
        assert_eq!(parse_record("a,b,\"12\"").unwrap(), vec![12]);
    }

    #[test]
    fn test_malformed_token() {
        let err = parse_record("a,b,3,\"7x\"").unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedToken { field: 3, token: "\"7x\"".to_string() }
        );
    }

    #[test]
    fn test_empty_field_is_malformed() {
        assert!(matches!(
            parse_record("a,b,3,,4"),
            Err(ParseError::MalformedToken { field: 3, .. })
        ));
    }

    #[test]
    fn test_reserved_fields_skipped() {
        // Metadata fields may hold anything, including non-numeric text
        assert_eq!(parse_record("participant,xx,1,2,3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_short_and_blank_lines_are_empty_routes() {
        assert!(parse_record("").unwrap().is_empty());
        assert!(parse_record("only,metadata").unwrap().is_empty());
    }

    #[test]
    fn test_header_token_mid_record() {
        assert_eq!(parse_record("p,q,Route,4,Route,9").unwrap(), vec![4, 9]);
    }

    #[test]
    fn test_padded_header_token_skipped() {
        assert_eq!(parse_record("P1, A, Route, 4").unwrap(), vec![4]);
        assert_eq!(parse_record("P1,A,\tRoute ,4").unwrap(), vec![4]);
    }

    #[test]
    fn test_whitespace_tolerated() {
        assert_eq!(parse_record("p,q, 4 ,\"5 ").unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_negative_ids() {
        assert_eq!(parse_record("p,q,-1,2").unwrap(), vec![-1, 2]);
    }

    #[test]
    fn test_custom_delimiter() {
        let config = TraceConfig { delimiter: ';', ..TraceConfig::default() };
        let parser = RecordParser::new(&config);
        assert_eq!(parser.parse("p;q;1;\"2").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_quoted_header_token_is_malformed() {
        assert!(parse_record("p,q,\"Route").is_err());
    }
}
