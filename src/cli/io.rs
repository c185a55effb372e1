//! JSON I/O handling for CLI
//!
//! A request is one JSON object read from stdin (it may span lines). Each
//! command writes exactly one response line to stdout.

use std::io::{self, Read, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read a JSON request from stdin
pub fn read_request() -> CliResult<Value> {
    parse_request(io::stdin().lock())
}

fn parse_request<R: Read>(mut reader: R) -> CliResult<Value> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;

    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }

    let value: Value = serde_json::from_str(&input)?;
    if !value.is_object() {
        return Err(CliError::request_error("Request must be a JSON object"));
    }
    Ok(value)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&mut io::stdout().lock(), &json!({"status": "ok", "data": data}))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(
        &mut io::stdout().lock(),
        &json!({"status": "error", "code": code, "message": message}),
    )
}

fn write_line<W: Write>(writer: &mut W, response: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, response)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;

    #[test]
    fn test_multiline_request() {
        let input = "{\n  \"collection\": \"users\"\n}\n";
        let value = parse_request(input.as_bytes()).unwrap();
        assert_eq!(value, json!({"collection": "users"}));
    }

    #[test]
    fn test_rejects_empty_and_non_object() {
        let err = parse_request("  \n".as_bytes()).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::IoError);

        let err = parse_request("[1, 2]".as_bytes()).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::RequestError);
    }

    #[test]
    fn test_response_is_one_line() {
        let mut out = Vec::new();
        write_line(&mut out, &json!({"status": "ok", "data": {"a": 1}})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\"status\":\"ok\",\"data\":{\"a\":1}}\n");
    }
}
