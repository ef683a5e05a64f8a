//! Wire ↔ internal conversion at the façade boundary.
//!
//! Positions on the wire are 0-based `(line, character)` in UTF-16 units;
//! the core uses 1-based lines and UTF-8 byte columns plus a synthetic
//! file id. Every handler converts through here, never by hand.

use cangjie_ast::{Position, Range};
use cangjie_position::{LineIndex, WirePosition, from_wire, to_wire};
use serde_json::{Value, json};

/// Resolve the `textDocument.uri` of `params` to an absolute path.
pub fn path_of(params: &Value) -> Option<String> {
    let uri = params.get("textDocument")?.get("uri")?.as_str()?;
    cangjie_uri::uri_to_fs_path(uri).map(|p| p.display().to_string())
}

/// The wire position in `params.position`.
pub fn wire_position(params: &Value) -> Option<WirePosition> {
    let pos = params.get("position")?;
    Some(WirePosition {
        line: pos.get("line")?.as_u64()? as u32,
        character: pos.get("character")?.as_u64()? as u32,
    })
}

/// The wire range in `params.range`.
pub fn wire_range(params: &Value) -> Option<(WirePosition, WirePosition)> {
    let range = params.get("range")?;
    let read = |v: &Value| -> Option<WirePosition> {
        Some(WirePosition {
            line: v.get("line")?.as_u64()? as u32,
            character: v.get("character")?.as_u64()? as u32,
        })
    };
    Some((read(range.get("start")?)?, read(range.get("end")?)?))
}

/// Convert a wire position into an internal position against `text`.
pub fn to_internal(text: &str, file_id: u32, wire: WirePosition) -> Position {
    let index = LineIndex::new(text.to_string());
    let (line, column) = from_wire(&index, wire);
    Position::new(file_id, line, column)
}

/// Convert an internal position to wire JSON (`{line, character}`).
pub fn position_json(index: &LineIndex, pos: Position) -> Value {
    let wire = to_wire(index, pos.line, pos.column);
    json!({ "line": wire.line, "character": wire.character })
}

/// Convert an inclusive internal range (token extents) to wire JSON with
/// an exclusive end.
pub fn range_json(index: &LineIndex, range: Range) -> Value {
    let end = Position::new(range.end.file_id, range.end.line, range.end.column + 1);
    json!({
        "start": position_json(index, range.start),
        "end": position_json(index, end),
    })
}

/// Convert an already end-exclusive internal range to wire JSON.
pub fn range_json_exclusive(index: &LineIndex, range: Range) -> Value {
    json!({
        "start": position_json(index, range.start),
        "end": position_json(index, range.end),
    })
}

/// A `Location` JSON object.
pub fn location_json(uri: &str, index: &LineIndex, range: Range) -> Value {
    json!({ "uri": uri, "range": range_json(index, range) })
}

/// The `file://` URI for an absolute path.
pub fn uri_of(path: &str) -> String {
    cangjie_uri::fs_path_to_uri(path).unwrap_or_else(|_| format!("file://{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_testkit::must_some;
    use pretty_assertions::assert_eq;

    #[test]
    fn path_extraction() {
        let params = json!({"textDocument": {"uri": "file:///proj/a.cj"}});
        assert_eq!(must_some(path_of(&params)), "/proj/a.cj");
    }

    #[test]
    fn token_range_is_exclusive_on_the_wire() {
        // `add` at internal cols 6..=8 must reach the wire as chars 5..8.
        let index = LineIndex::new("func add(a: Int, b: Int): Int { a + b }".to_string());
        let range = Range::new(Position::new(1, 1, 6), Position::new(1, 1, 8));
        let value = range_json(&index, range);
        assert_eq!(value["start"]["character"], json!(5));
        assert_eq!(value["end"]["character"], json!(8));
    }

    #[test]
    fn wire_position_round_trip() {
        let text = "func add() {}\n";
        let pos = to_internal(text, 1, WirePosition { line: 0, character: 5 });
        assert_eq!((pos.line, pos.column), (1, 6));
    }
}
