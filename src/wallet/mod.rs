// Wallet and transaction building

mod keystore;
mod tx_builder;
mod tx_signer;

pub use keystore::PkhKeyMap;
pub use tx_builder::TxBuilder;
pub use tx_signer::TxSigner;
