//! CLI commands for the wire protocol
//!
//! Implements all command handlers for the CLI interface.

use crate::config::WireConfig;
use crate::core::{AuditMission, BlockAssembler, Outpoint, Transaction, TxIn, TxOut};
use crate::crypto::{calculate_merkle_root, sha256, Hash256, MerkleTree};
use crate::network::{decode_message, Message, Payload, PingPayload};
use chrono::Utc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(cleaned.trim_start_matches("0x"))?)
}

/// Decode one framed message and print it as JSON
pub fn cmd_decode(config: &WireConfig, input: &str) -> CliResult<()> {
    let bytes = decode_hex(input)?;
    let (message, rest) = decode_message(&bytes)?;

    if message.magic != config.magic {
        println!(
            "⚠️  Magic {} does not match configured network {}",
            hex::encode(message.magic),
            hex::encode(config.magic)
        );
    }

    println!("📨 {} message", message.command());
    println!("{}", serde_json::to_string_pretty(&message)?);

    if !rest.is_empty() {
        println!("\n   {} trailing byte(s) after the frame", rest.len());
    }

    Ok(())
}

/// Print a framed ping
pub fn cmd_ping(config: &WireConfig, nonce: Option<u64>) -> CliResult<()> {
    let payload = nonce.map(PingPayload::new).unwrap_or_else(PingPayload::random);
    let message = Message::new(config.magic, Payload::Ping(payload));

    println!("🏓 ping nonce {:#018x}", payload.nonce);
    println!("{}", hex::encode(message.serialize()));
    Ok(())
}

/// Compute the Merkle root over hex leaf hashes
pub fn cmd_merkle_root(leaves: &[String]) -> CliResult<()> {
    let hashes = leaves
        .iter()
        .map(|leaf| {
            Hash256::from_hex(leaf).ok_or_else(|| format!("not a 32-byte hex hash: {}", leaf))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let root = calculate_merkle_root(&hashes);
    println!("🌳 Merkle root over {} leaves", hashes.len());
    println!("   {}", root);

    if let Some(tree) = MerkleTree::from_leaves(&hashes) {
        if tree.root() != root {
            println!(
                "   Incremental tree gives {} (a leaf repeats the first leaf and was skipped)",
                tree.root()
            );
        }
    }

    Ok(())
}

/// Assemble a demo block and print its framed `block` message
pub fn cmd_assemble(config: &WireConfig, height: u64, script: &str, txs: u32) -> CliResult<()> {
    let mission = AuditMission::new(height, decode_hex(script)?)?;
    let time = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
    let mut assembler = BlockAssembler::new(Hash256::ZERO, time, mission);

    for n in 0..txs {
        let seed = n.to_le_bytes();
        let input = TxIn::new(Outpoint::new(sha256(&seed), n), seed.to_vec())?;
        let output = TxOut::new(u64::from(n) * 50, sha256(&seed).as_bytes().to_vec())?;
        assembler.push(Transaction::new(vec![input], vec![output], 0));
    }

    let block = assembler.build()?;
    let header = block.header();

    println!("🧱 Block assembled!");
    println!("   ├─ Height: {}", height);
    println!("   ├─ Transactions: {}", block.tx_count());
    println!("   ├─ Time: {}", header.time);
    println!("   ├─ Header hash: {}", header.hash());
    println!("   └─ Merkle root: {}", header.merkle_root_hash);

    let message = Message::new(config.magic, Payload::Block(block));
    println!("\n{}", hex::encode(message.serialize()));
    log::debug!("Block frame is {} bytes", message.serialize().len());

    Ok(())
}
