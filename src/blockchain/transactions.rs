// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Native transfer construction and lamport conversion.

use solana_sdk::{
    hash::Hash, message::Message, packet::PACKET_DATA_SIZE, pubkey::Pubkey, system_instruction,
    transaction::Transaction,
};

use super::client::ChainRpcError;
use super::types::{LAMPORTS_PER_SOL, NATIVE_DECIMALS};

/// Build an unsigned single-instruction SOL transfer with `from` as fee payer.
pub fn build_native_transfer(
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
    recent_blockhash: Hash,
) -> Transaction {
    let instruction = system_instruction::transfer(from, to, lamports);
    let message = Message::new_with_blockhash(&[instruction], Some(from), &recent_blockhash);
    Transaction::new_unsigned(message)
}

/// Wire-serialize a transaction for the wallet or for `sendTransaction`.
/// Transactions larger than one packet are rejected.
pub fn serialize_transaction(transaction: &Transaction) -> Result<Vec<u8>, ChainRpcError> {
    let wire =
        bincode::serialize(transaction).map_err(|e| ChainRpcError::Serialization(e.to_string()))?;
    if wire.len() > PACKET_DATA_SIZE {
        return Err(ChainRpcError::Serialization(format!(
            "transaction is {} bytes, limit is {PACKET_DATA_SIZE}",
            wire.len()
        )));
    }
    Ok(wire)
}

/// Convert a SOL amount to lamports, rounding to the nearest lamport.
///
/// Returns `None` for non-finite, non-positive, or overflowing amounts.
pub fn sol_to_lamports(amount: f64) -> Option<u64> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let lamports = (amount * LAMPORTS_PER_SOL as f64).round();
    if lamports < 1.0 || lamports >= u64::MAX as f64 {
        return None;
    }
    Some(lamports as u64)
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Format lamports (or token base units) as a human-readable amount.
pub fn format_amount(amount: u64, decimals: u8) -> String {
    if amount == 0 {
        return "0".to_string();
    }

    let divisor = 10u64.pow(decimals as u32);
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder == 0 {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

/// Format lamports as SOL.
pub fn format_sol(lamports: u64) -> String {
    format_amount(lamports, NATIVE_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sol_to_lamports() {
        assert_eq!(sol_to_lamports(0.5), Some(500_000_000));
        assert_eq!(sol_to_lamports(1.0), Some(1_000_000_000));
        assert_eq!(sol_to_lamports(0.000000001), Some(1));
        // 0.1 + 0.2 style float noise still lands on a whole lamport
        assert_eq!(sol_to_lamports(0.1 + 0.2), Some(300_000_000));
    }

    #[test]
    fn test_sol_to_lamports_rejects_bad_amounts() {
        assert_eq!(sol_to_lamports(0.0), None);
        assert_eq!(sol_to_lamports(-1.0), None);
        assert_eq!(sol_to_lamports(f64::NAN), None);
        assert_eq!(sol_to_lamports(f64::INFINITY), None);
        assert_eq!(sol_to_lamports(0.0000000001), None);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_sol(1_000_000_000), "1");
        assert_eq!(format_sol(1_500_000_000), "1.5");
        assert_eq!(format_sol(1), "0.000000001");
        assert_eq!(format_amount(1_500_000, 6), "1.5");
        assert_eq!(format_amount(0, 6), "0");
    }

    #[test]
    fn oversized_transaction_is_rejected() {
        let from = Pubkey::new_unique();
        let instructions: Vec<_> = (0..48)
            .map(|_| system_instruction::transfer(&from, &Pubkey::new_unique(), 1))
            .collect();
        let message = Message::new_with_blockhash(&instructions, Some(&from), &Hash::new_unique());
        let tx = Transaction::new_unsigned(message);

        let err = serialize_transaction(&tx).unwrap_err();
        assert!(matches!(err, ChainRpcError::Serialization(_)));

        let single = build_native_transfer(&from, &Pubkey::new_unique(), 1, Hash::new_unique());
        assert!(serialize_transaction(&single).unwrap().len() <= PACKET_DATA_SIZE);
    }

    #[test]
    fn transfer_has_payer_and_blockhash() {
        let from = Pubkey::new_unique();
        let to = Pubkey::new_unique();
        let blockhash = Hash::new_unique();

        let tx = build_native_transfer(&from, &to, 42, blockhash);

        assert_eq!(tx.message.account_keys[0], from);
        assert!(tx.message.account_keys.contains(&to));
        assert_eq!(tx.message.recent_blockhash, blockhash);
        assert_eq!(tx.message.instructions.len(), 1);
        assert_eq!(tx.signatures.len(), 1);

        let bytes = serialize_transaction(&tx).unwrap();
        let decoded: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }
}
