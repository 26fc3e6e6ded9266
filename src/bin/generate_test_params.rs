//! Generate shielded test parameters
//!
//! This tool builds a mint, transfer or burn parameter bundle against the
//! mock backend and prints it as JSON, for wiring up host-side tests.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use shielded_params::testing::{
    test_address, test_merkle_path, test_note, test_spending_key, MockBackend,
};
use shielded_params::{DigestEngine, Operation, OperationKind, ParametersBuilder, PaymentAddress};

#[derive(Parser, Debug)]
#[command(name = "generate_test_params")]
#[command(about = "build shielded test parameters with the mock backend", long_about = None)]
struct Args {
    /// Operation to build: mint, transfer or burn
    operation: String,

    /// Amount moved by the operation
    #[arg(long, default_value_t = 100)]
    amount: u64,

    /// Seed for keys, addresses and mock randomness
    #[arg(long, default_value_t = 42)]
    seed: u8,

    /// Shielded pool address (hex)
    #[arg(long, default_value = "41aabbccddeeff00112233445566778899aabbccdd")]
    pool: String,

    /// Transparent withdrawal address for burn (hex)
    #[arg(long, default_value = "41000102030405060708090a0b0c0d0e0f10111213")]
    to_address: String,

    /// Raw 43-byte recipient address for mint and transfer (hex); a test
    /// address derived from the seed when omitted
    #[arg(long)]
    recipient: Option<String>,

    /// Also produce spend authorization signatures
    #[arg(long)]
    with_ask: bool,

    /// Hash the message with BLAKE2b-256 instead of SHA-256
    #[arg(long)]
    blake2b: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shielded_params=info,generate_test_params=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let kind: OperationKind = args.operation.parse()?;
    let pool = hex::decode(&args.pool).context("pool address is not hex")?;
    let ovk = test_spending_key(args.seed).ovk().to_vec();
    let anchor = [0u8; 32];

    let backend = MockBackend::new(u64::from(args.seed));
    let operation = match kind {
        OperationKind::Mint => Operation::Mint {
            from_amount: args.amount,
        },
        OperationKind::Transfer => Operation::Transfer,
        OperationKind::Burn => Operation::Burn {
            to_address: hex::decode(&args.to_address).context("to address is not hex")?,
            to_amount: args.amount,
        },
    };
    let engine = if args.blake2b {
        DigestEngine::Blake2b256
    } else {
        DigestEngine::Sha256
    };

    let mut builder = ParametersBuilder::new(&backend, operation, pool).with_digest_engine(engine);
    let recipient = match &args.recipient {
        Some(raw) => {
            PaymentAddress::from_bytes(&hex::decode(raw).context("recipient is not hex")?)?
        }
        None => test_address(args.seed.wrapping_add(1)),
    };
    match kind {
        OperationKind::Mint => builder.add_output(&ovk, recipient, args.amount, None)?,
        OperationKind::Transfer => {
            builder.add_spend(
                test_spending_key(args.seed),
                test_note(args.amount, args.seed),
                anchor,
                test_merkle_path(0),
            )?;
            // The output stays recoverable by the spender
            let spender_ovk = builder
                .spends()
                .first()
                .and_then(|spend| spend.key_material().ovk())
                .map_or_else(|| ovk.clone(), |k| k.to_vec());
            builder.add_output(&spender_ovk, recipient, args.amount, None)?;
        }
        OperationKind::Burn => builder.add_spend(
            test_spending_key(args.seed),
            test_note(args.amount, args.seed),
            anchor,
            test_merkle_path(0),
        )?,
    }

    if kind != OperationKind::Burn {
        info!("recipient {}", hex::encode(recipient.to_bytes()));
    }
    info!("building {} parameters for amount {}", kind, args.amount);
    let bundle = builder.build(args.with_ask)?;
    info!(
        "parameters built: {} spends, {} receives, digest {}",
        bundle.spend_descriptions().len(),
        bundle.receive_descriptions().len(),
        hex::encode(bundle.message_digest())
    );

    println!("{}", bundle.to_json()?);
    Ok(())
}
