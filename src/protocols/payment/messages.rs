//! Wire format of the classical payment messages.
//!
//! Client → Merchant: `"<client_public_id>,<bits>"`.
//! Merchant → Bank: `"<client_public_id>,<bits>,<merchant_public_id>"`.

use super::PaymentError;
use super::basis::{parse_bit_string, to_bit_string};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    pub client_id: String,
    pub bits: Vec<bool>,
}

impl ClientMessage {
    pub fn parse(text: &str, key_length: usize) -> Result<Self, PaymentError> {
        const EXPECTED: &str = "\"client_id,measured_value\"";
        let fields = split_fields(text, 2, EXPECTED)?;
        Ok(Self {
            client_id: fields[0].to_string(),
            bits: parse_bits(fields[1], key_length, text, EXPECTED)?,
        })
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.client_id, to_bit_string(&self.bits))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantMessage {
    pub client_id: String,
    pub bits: Vec<bool>,
    pub merchant_id: String,
}

impl MerchantMessage {
    /// Appends the merchant's public id to what the client reported.
    pub fn forward(client: ClientMessage, merchant_id: impl Into<String>) -> Self {
        Self {
            client_id: client.client_id,
            bits: client.bits,
            merchant_id: merchant_id.into(),
        }
    }

    pub fn parse(text: &str, key_length: usize) -> Result<Self, PaymentError> {
        const EXPECTED: &str = "\"client_id,measured_value,merchant_id\"";
        let fields = split_fields(text, 3, EXPECTED)?;
        Ok(Self {
            client_id: fields[0].to_string(),
            bits: parse_bits(fields[1], key_length, text, EXPECTED)?,
            merchant_id: fields[2].to_string(),
        })
    }
}

impl fmt::Display for MerchantMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.client_id,
            to_bit_string(&self.bits),
            self.merchant_id
        )
    }
}

fn split_fields<'a>(
    text: &'a str,
    count: usize,
    expected: &'static str,
) -> Result<Vec<&'a str>, PaymentError> {
    let fields: Vec<&str> = text.split(',').collect();
    if fields.len() != count || fields.iter().any(|f| f.is_empty()) {
        return Err(PaymentError::MalformedMessage {
            expected,
            got: text.to_string(),
        });
    }
    Ok(fields)
}

fn parse_bits(
    field: &str,
    key_length: usize,
    text: &str,
    expected: &'static str,
) -> Result<Vec<bool>, PaymentError> {
    parse_bit_string(field)
        .filter(|bits| bits.len() == key_length)
        .ok_or_else(|| PaymentError::MalformedMessage {
            expected,
            got: text.to_string(),
        })
}
