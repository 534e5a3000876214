//! Numeric encoding rules shared by the interface layer.

/// Construct the raw 32-bit pattern for a floating value.
pub fn f32_to_bits(value: f32) -> u32 {
    value.to_bits()
}

/// Reinterpret a raw 32-bit pattern as a floating value.
pub fn bits_to_f32(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Add `amount` to `current`, clamped at `maximum`.
///
/// Repeated application of the same grant is safe up to the ceiling,
/// which is what makes item replay after an interruption harmless.
pub fn clamped_add(current: u32, amount: u32, maximum: u32) -> u32 {
    current.saturating_add(amount).min(maximum)
}

/// Floating-domain variant of [`clamped_add`].
pub fn clamped_add_f32(current: f32, amount: f32, maximum: f32) -> f32 {
    (current + amount).min(maximum)
}

/// Write width for the on-screen counter, chosen by the magnitude of
/// the value being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterWidth {
    Byte,
    Word,
    Dword,
}

impl CounterWidth {
    pub fn for_value(value: u32) -> Self {
        if value <= u8::MAX as u32 {
            CounterWidth::Byte
        } else if value <= u16::MAX as u32 {
            CounterWidth::Word
        } else {
            CounterWidth::Dword
        }
    }
}
