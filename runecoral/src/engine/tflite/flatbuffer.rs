// SPDX-License-Identifier: Apache-2.0

//! Just enough of a flatbuffer reader to count the operators of a TensorFlow
//! Lite model, which the C API does not expose.

/// `Model.subgraphs`
const MODEL_SUBGRAPHS: usize = 2;
/// `SubGraph.operators`
const SUBGRAPH_OPERATORS: usize = 3;

fn read_u16(buf: &[u8], pos: usize) -> Option<u16> {
    let bytes = buf.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(buf: &[u8], pos: usize) -> Option<u32> {
    let bytes = buf.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Follows the unsigned offset stored at `pos`.
fn deref(buf: &[u8], pos: usize) -> Option<usize> {
    pos.checked_add(read_u32(buf, pos)? as usize)
}

/// Position of field `index` of the table at `table`, if present.
fn field(buf: &[u8], table: usize, index: usize) -> Option<usize> {
    let soffset = read_u32(buf, table)? as i32;
    let vtable = (table as i64).checked_sub(soffset as i64)?;
    let vtable = usize::try_from(vtable).ok()?;

    let vtable_size = read_u16(buf, vtable)? as usize;
    let entry = 4 + 2 * index;
    if entry + 2 > vtable_size {
        return None;
    }

    match read_u16(buf, vtable + entry)? {
        0 => None,
        offset => table.checked_add(offset as usize),
    }
}

/// Number of operators in the first subgraph of a `.tflite` model.
pub(crate) fn operator_count(buf: &[u8]) -> Option<usize> {
    let model = deref(buf, 0)?;
    let subgraphs = deref(buf, field(buf, model, MODEL_SUBGRAPHS)?)?;
    if read_u32(buf, subgraphs)? == 0 {
        return Some(0);
    }

    let subgraph = deref(buf, subgraphs + 4)?;
    match field(buf, subgraph, SUBGRAPH_OPERATORS) {
        Some(operators) => Some(read_u32(buf, deref(buf, operators)?)? as usize),
        None => Some(0),
    }
}
