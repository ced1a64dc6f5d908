// m-of-n multisig spends evaluated through the verifier

use ebx_core::consensus::{ScriptInterpreter, TxVerifier, ValidationError};
use ebx_core::core::{
    HashCache, Hash256, KeyPair, OutPoint, PubKey, Script, Tx, TxIn, TxOut, TxOutMap,
    TxSignature,
};
use ebx_core::error::ScriptError;

struct MultisigOutput {
    keys: Vec<KeyPair>,
    script: Script,
    outpoint: OutPoint,
    value: u64,
}

fn multisig_output(required: u8, n: usize) -> MultisigOutput {
    let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    let pub_keys: Vec<PubKey> = keys.iter().map(|k| k.pub_key).collect();
    MultisigOutput {
        script: Script::from_multisig_output(required, &pub_keys).unwrap(),
        keys,
        outpoint: OutPoint::new(Hash256::alloc(3), 0),
        value: 500,
    }
}

fn spending_tx(output: &MultisigOutput) -> Tx {
    let input = TxIn::new(output.outpoint.tx_id, output.outpoint.index, Script::default(), 0);
    Tx::new(0, vec![input], vec![TxOut::new(400, Script::default())], 0)
}

/// Sign input 0 with the keys at `signers`, in that order
fn sign_with(tx: &mut Tx, output: &MultisigOutput, signers: &[usize]) {
    let script_bytes = output.script.to_bytes();
    let mut cache = HashCache::new();
    let sigs: Vec<TxSignature> = signers
        .iter()
        .map(|&i| {
            tx.sign_with_cache(
                0,
                &output.keys[i].priv_key,
                &script_bytes,
                output.value,
                TxSignature::SIGHASH_ALL,
                &mut cache,
            )
            .unwrap()
        })
        .collect();
    tx.inputs[0].script = Script::from_multisig_input(&sigs);
}

fn tx_out_map(output: &MultisigOutput) -> TxOutMap {
    let mut map = TxOutMap::new();
    map.add(output.outpoint, TxOut::new(output.value, output.script.clone()), 0);
    map
}

#[test]
fn test_two_of_three_any_order() {
    let output = multisig_output(2, 3);
    assert!(output.script.is_multisig_output());
    let map = tx_out_map(&output);

    for signers in [[0, 1], [1, 0], [0, 2], [2, 1]] {
        let mut tx = spending_tx(&output);
        sign_with(&mut tx, &output, &signers);
        assert!(tx.inputs[0].script.is_multisig_input());
        assert_eq!(TxVerifier::new(&tx, &map).verify(), Ok(()), "signers {:?}", signers);
    }
}

#[test]
fn test_foreign_signature_fails() {
    let output = multisig_output(2, 3);
    let map = tx_out_map(&output);
    let mut tx = spending_tx(&output);

    let outsider = KeyPair::generate();
    let script_bytes = output.script.to_bytes();
    let good = tx
        .sign_no_cache(0, &output.keys[0].priv_key, &script_bytes, output.value, TxSignature::SIGHASH_ALL)
        .unwrap();
    let bad = tx
        .sign_no_cache(0, &outsider.priv_key, &script_bytes, output.value, TxSignature::SIGHASH_ALL)
        .unwrap();
    tx.inputs[0].script = Script::from_multisig_input(&[good, bad]);

    assert_eq!(
        TxVerifier::new(&tx, &map).verify(),
        Err(ValidationError::ScriptFailed { index: 0, error: None })
    );
}

#[test]
fn test_same_key_counts_once() {
    let output = multisig_output(2, 3);
    let map = tx_out_map(&output);
    let mut tx = spending_tx(&output);
    sign_with(&mut tx, &output, &[1, 1]);
    assert!(!TxVerifier::new(&tx, &map).is_valid());
}

#[test]
fn test_too_few_signatures() {
    let output = multisig_output(2, 3);
    let map = tx_out_map(&output);
    let mut tx = spending_tx(&output);
    sign_with(&mut tx, &output, &[0]);

    assert_eq!(
        TxVerifier::new(&tx, &map).verify(),
        Err(ValidationError::ScriptFailed {
            index: 0,
            error: Some(ScriptError::InvalidStackOperation)
        })
    );
}

#[test]
fn test_sixteen_keys_direct_eval() {
    let output = multisig_output(16, 16);
    let mut tx = spending_tx(&output);
    let all: Vec<usize> = (0..16).collect();
    sign_with(&mut tx, &output, &all);

    let stack: Vec<Vec<u8>> = tx.inputs[0]
        .script
        .chunks
        .iter()
        .map(|c| c.data().unwrap().to_vec())
        .collect();
    let mut cache = HashCache::new();
    let mut interp =
        ScriptInterpreter::from_output_script_tx(&output.script, &tx, 0, stack, output.value, &mut cache);
    assert!(interp.eval_script());
    assert_eq!(interp.error(), None);
}

#[test]
fn test_too_many_keys() {
    let keys: Vec<PubKey> = (0..17).map(|_| KeyPair::generate().pub_key).collect();
    assert!(Script::from_multisig_output(1, &keys).is_err());

    // a hand-written 17-key script halts in the interpreter
    let mut text = String::from("OP_1");
    for key in &keys {
        text.push_str(&format!(" 0x{}", hex::encode(key.as_ref())));
    }
    text.push_str(" 0x11 OP_CHECKMULTISIG");
    let script: Script = text.parse().unwrap();
    let tx = Tx::new(0, vec![TxIn::new(Hash256::zero(), 0, Script::default(), 0)], vec![], 0);
    let mut cache = HashCache::new();
    let mut interp = ScriptInterpreter::from_script_tx(&script, &tx, 0, &mut cache);
    assert!(!interp.eval_script());
    assert_eq!(interp.error(), Some(ScriptError::InvalidKeyCount));
}
