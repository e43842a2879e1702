//! The per-unit support library.
//!
//! It carries the fixed-point float conversions, written out from the
//! constants of [`protosol::fixed_point`] so the Solidity and Rust sides of a
//! conversion cannot drift apart, and the length backpatching routine the
//! encoders share.

use protosol::fixed_point::{FloatFormat, DOUBLE, FLOAT};

use super::types::LIB;
use super::writer::CodeWriter;
use crate::config::GenerateMode;
use crate::context::Unit;

/// Name of the support library of a unit.
pub fn support_name(unit_ident: &str) -> String {
    format!("{}_Support", unit_ident)
}

/// Whether a unit needs a support library at all.
pub fn needed(unit: &Unit, mode: GenerateMode) -> bool {
    unit.uses_float || unit.uses_double || mode.encoder()
}

/// One IEEE-754 width as the generated code sees it.
struct Width {
    /// `float` or `double`, the routine name stem.
    name: &'static str,
    format: FloatFormat,
    /// Storage type of the scaled value.
    scaled: &'static str,
    /// Type of the raw bit pattern.
    raw: &'static str,
    /// Runtime library routine stem for the raw bits.
    fixed: &'static str,
}

const FLOAT_WIDTH: Width = Width {
    name: "float",
    format: FLOAT,
    scaled: "int32",
    raw: "uint32",
    fixed: "fixed32",
};

const DOUBLE_WIDTH: Width = Width {
    name: "double",
    format: DOUBLE,
    scaled: "int64",
    raw: "uint64",
    fixed: "fixed64",
};

pub fn emit_support(w: &mut CodeWriter, name: &str, unit: &Unit, mode: GenerateMode) {
    w.open(format!("library {} {{", name));

    let mut widths = Vec::new();
    if unit.uses_float {
        widths.push(&FLOAT_WIDTH);
    }
    if unit.uses_double {
        widths.push(&DOUBLE_WIDTH);
    }

    let mut first = true;
    for width in widths {
        if !std::mem::take(&mut first) {
            w.blank();
        }
        // Decoding only scales, encoding only unscales.
        if mode.decoder() {
            emit_to_scaled(w, width);
            w.blank();
            emit_decode_scaled(w, width);
        }
        if mode.decoder() && mode.encoder() {
            w.blank();
        }
        if mode.encoder() {
            emit_from_scaled(w, width);
            w.blank();
            emit_encode_scaled(w, width);
        }
    }

    if mode.encoder() {
        if !first {
            w.blank();
        }
        emit_backpatch_length(w);
    }

    w.close("}");
}

/// Raw bits to scaled integer, truncating toward zero and saturating.
fn emit_to_scaled(w: &mut CodeWriter, width: &Width) {
    let f = &width.format;
    let max = f.max_scaled();
    let origin = f.shift_origin();

    w.open(format!(
        "function {}_to_scaled({} raw) internal pure returns ({}) {{",
        width.name, width.raw, width.scaled
    ));
    w.line("uint256 bits = uint256(raw);");
    w.line(format!(
        "uint256 exponent = (bits >> {}) & {:#x};",
        f.mantissa_bits,
        f.exponent_mask()
    ));
    w.line(format!("uint256 mantissa = bits & {:#x};", f.mantissa_mask()));
    w.guard("exponent == 0", "return 0;");
    w.guard(
        format!("exponent == {:#x}", f.exponent_mask()),
        format!("return {};", max),
    );
    w.blank();
    w.line(format!(
        "uint256 magnitude = (mantissa | {:#x}) * {};",
        f.implicit_bit(),
        f.scale
    ));
    w.open(format!("if (exponent >= {}) {{", origin));
    w.line(format!("uint256 up = exponent - {};", origin));
    w.open(format!("if (up >= 64 || magnitude > ({} >> up)) {{", max));
    w.line(format!("magnitude = {};", max));
    w.reopen("} else {");
    w.line("magnitude = magnitude << up;");
    w.close("}");
    w.reopen("} else {");
    w.line(format!("magnitude = magnitude >> ({} - exponent);", origin));
    w.close("}");
    w.guard(format!("magnitude > {}", max), format!("magnitude = {};", max));
    w.blank();
    w.guard(
        format!("((bits >> {}) & 1) == 1", f.bits - 1),
        format!("return -{}(int256(magnitude));", width.scaled),
    );
    w.line(format!("return {}(int256(magnitude));", width.scaled));
    w.close("}");
}

/// Scaled integer to the bit pattern the encoder writes for it.
fn emit_from_scaled(w: &mut CodeWriter, width: &Width) {
    let f = &width.format;

    w.open(format!(
        "function scaled_to_{}({} value) internal pure returns ({}) {{",
        width.name, width.scaled, width.raw
    ));
    w.guard("value == 0", "return 0;");
    w.blank();
    w.line("uint256 sign = 0;");
    w.line("uint256 magnitude = uint256(int256(value));");
    w.open("if (value < 0) {");
    w.line(format!("sign = 1 << {};", f.bits - 1));
    w.line("magnitude = uint256(-int256(value));");
    w.close("}");
    w.blank();
    w.line(format!("uint256 target = {} << {};", f.scale, f.mantissa_bits));
    w.line("uint256 k = 0;");
    w.open("while ((magnitude << k) < target) {");
    w.line("k += 1;");
    w.close("}");
    w.line(format!(
        "uint256 mantissa = ((magnitude << k) + {} - 1) / {};",
        f.scale, f.scale
    ));
    w.open(format!("if (mantissa == ({:#x} << 1) && k > 0) {{", f.implicit_bit()));
    w.line("mantissa = mantissa >> 1;");
    w.line("k -= 1;");
    w.close("}");
    w.blank();
    w.line(format!("uint256 exponent = {} - k;", f.shift_origin()));
    w.line(format!(
        "return {}(sign | (exponent << {}) | (mantissa & {:#x}));",
        width.raw,
        f.mantissa_bits,
        f.mantissa_mask()
    ));
    w.close("}");
}

fn emit_decode_scaled(w: &mut CodeWriter, width: &Width) {
    w.open(format!(
        "function decode_{}_scaled(uint64 pos, bytes memory buf) internal pure returns (bool, uint64, {}) {{",
        width.name, width.scaled
    ));
    w.line(format!(
        "(bool success, uint64 new_pos, {} raw) = {}.decode_{}(pos, buf);",
        width.raw, LIB, width.fixed
    ));
    w.guard("!success", "return (false, new_pos, 0);");
    w.blank();
    w.line(format!("return (true, new_pos, {}_to_scaled(raw));", width.name));
    w.close("}");
}

fn emit_encode_scaled(w: &mut CodeWriter, width: &Width) {
    w.open(format!(
        "function encode_{}_scaled(uint64 pos, bytes memory buf, {} value) internal pure returns (uint64) {{",
        width.name, width.scaled
    ));
    w.line(format!(
        "return {}.encode_{}(pos, buf, scaled_to_{}(value));",
        LIB, width.fixed, width.name
    ));
    w.close("}");
}

/// Writes the length of the record whose payload starts at `len_pos + 1`
/// into the byte reserved at `len_pos`. Longer varints shift the payload.
fn emit_backpatch_length(w: &mut CodeWriter) {
    w.open("function backpatch_length(uint64 len_pos, uint64 pos, bytes memory buf) internal pure returns (uint64) {");
    w.line("uint64 len = pos - len_pos - 1;");
    w.line("uint64 size = 1;");
    w.line("uint64 rest = len >> 7;");
    w.open("while (rest != 0) {");
    w.line("size += 1;");
    w.line("rest = rest >> 7;");
    w.close("}");
    w.blank();
    w.open("if (size > 1) {");
    w.open("for (uint64 i = pos; i > len_pos + 1; i--) {");
    w.line("buf[i - 1 + size - 1] = buf[i - 1];");
    w.close("}");
    w.close("}");
    w.blank();
    w.line("uint64 value = len;");
    w.open("for (uint64 j = 0; j < size; j++) {");
    w.line("uint8 b = uint8(value & 0x7f);");
    w.line("value = value >> 7;");
    w.guard("value != 0", "b = b | 0x80;");
    w.line("buf[len_pos + j] = bytes1(b);");
    w.close("}");
    w.line("return pos + size - 1;");
    w.close("}");
}
