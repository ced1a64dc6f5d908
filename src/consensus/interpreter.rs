// Script interpreter: a stack machine evaluated against a transaction

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use crate::core::opcode::Opcode;
use crate::core::{
    blake3_hash, double_blake3_hash, HashCache, PubKey, Script, ScriptChunk, ScriptNum, Tx,
    TxSignature,
};
use crate::error::ScriptError;

type StepResult<T = ()> = std::result::Result<T, ScriptError>;

/// How the fetch-decode-execute loop continues after one chunk
enum Flow {
    Next,
    Return,
}

/// Truthiness of a stack item: any non-zero byte
pub fn cast_to_bool(buf: &[u8]) -> bool {
    buf.iter().any(|b| *b != 0)
}

fn bool_num(value: bool) -> BigInt {
    BigInt::from(value as u8)
}

/// State of one script evaluation
///
/// Errors never escape [`ScriptInterpreter::eval_script`]: the first failure
/// is recorded, the loop stops, and the top of the stack is kept as the
/// diagnostic return value.
pub struct ScriptInterpreter<'a> {
    script: &'a Script,
    tx: &'a Tx,
    n_in: usize,
    stack: Vec<Vec<u8>>,
    alt_stack: Vec<Vec<u8>>,
    pc: usize,
    op_count: usize,
    if_stack: Vec<bool>,
    value: u64,
    hash_cache: &'a mut HashCache,
    return_value: Option<Vec<u8>>,
    return_success: Option<bool>,
    error: Option<ScriptError>,
}

impl<'a> ScriptInterpreter<'a> {
    pub const MAX_MULTISIG_KEYS: usize = 16;

    /// Interpreter with empty stacks and a zero input value
    pub fn from_script_tx(
        script: &'a Script,
        tx: &'a Tx,
        n_in: usize,
        hash_cache: &'a mut HashCache,
    ) -> Self {
        Self::from_output_script_tx(script, tx, n_in, Vec::new(), 0, hash_cache)
    }

    /// Interpreter for a locking script, with the stack left by the
    /// unlocking script and the value of the output being spent
    pub fn from_output_script_tx(
        script: &'a Script,
        tx: &'a Tx,
        n_in: usize,
        stack: Vec<Vec<u8>>,
        value: u64,
        hash_cache: &'a mut HashCache,
    ) -> Self {
        Self {
            script,
            tx,
            n_in,
            stack,
            alt_stack: Vec::new(),
            pc: 0,
            op_count: 0,
            if_stack: Vec::new(),
            value,
            hash_cache,
            return_value: None,
            return_success: None,
            error: None,
        }
    }

    pub fn stack(&self) -> &[Vec<u8>] {
        &self.stack
    }

    pub fn alt_stack(&self) -> &[Vec<u8>] {
        &self.alt_stack
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Number of non-push opcodes executed
    pub fn op_count(&self) -> usize {
        self.op_count
    }

    /// Top of the stack when evaluation stopped, empty if the stack was empty
    pub fn return_value(&self) -> Option<&[u8]> {
        self.return_value.as_deref()
    }

    pub fn return_success(&self) -> Option<bool> {
        self.return_success
    }

    pub fn error(&self) -> Option<ScriptError> {
        self.error
    }

    /// Consume the interpreter, keeping the main stack
    pub fn into_stack(self) -> Vec<Vec<u8>> {
        self.stack
    }

    /// Run the script to completion
    pub fn eval_script(&mut self) -> bool {
        if let Err(err) = self.run() {
            log::debug!("script halted at chunk {}: {}", self.pc, err);
            self.error = Some(err);
        }
        let top = self.stack.last().cloned().unwrap_or_default();
        let success = self.error.is_none() && cast_to_bool(&top);
        self.return_value = Some(top);
        self.return_success = Some(success);
        success
    }

    fn run(&mut self) -> StepResult {
        let script = self.script;
        while self.pc < script.chunks.len() {
            let chunk = &script.chunks[self.pc];
            let opcode = chunk.opcode();
            let executing = !self.if_stack.contains(&false);
            let conditional = matches!(
                opcode,
                Some(Opcode::OpIf | Opcode::OpNotIf | Opcode::OpElse | Opcode::OpEndIf)
            );

            if executing || conditional {
                if chunk.opcode_byte() > Opcode::Op16.to_byte() {
                    self.op_count += 1;
                }
                if let Flow::Return = self.step(chunk, opcode, executing)? {
                    return Ok(());
                }
            }
            self.pc += 1;
        }
        if !self.if_stack.is_empty() {
            return Err(ScriptError::UnbalancedConditional);
        }
        Ok(())
    }

    fn require(&self, depth: usize) -> StepResult {
        if self.stack.len() < depth {
            return Err(ScriptError::InvalidStackOperation);
        }
        Ok(())
    }

    fn pop(&mut self) -> StepResult<Vec<u8>> {
        self.stack.pop().ok_or(ScriptError::InvalidStackOperation)
    }

    fn pop_num(&mut self) -> StepResult<ScriptNum> {
        Ok(ScriptNum::from_bytes(&self.pop()?))
    }

    fn top(&self) -> StepResult<&Vec<u8>> {
        self.stack.last().ok_or(ScriptError::InvalidStackOperation)
    }

    fn push_num(&mut self, num: BigInt) {
        self.stack.push(ScriptNum::new(num).to_bytes());
    }

    fn push_bool(&mut self, value: bool) {
        self.stack.push(if value { vec![1] } else { Vec::new() });
    }

    fn unary_num(&mut self, f: impl FnOnce(BigInt) -> BigInt) -> StepResult {
        self.require(1)?;
        let a = self.pop_num()?;
        self.push_num(f(a.num));
        Ok(())
    }

    /// Pops `b` (top) then `a` and pushes `f(a, b)`
    fn binary_num(&mut self, f: impl FnOnce(BigInt, BigInt) -> StepResult<BigInt>) -> StepResult {
        self.require(2)?;
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        let out = f(a.num, b.num)?;
        self.push_num(out);
        Ok(())
    }

    fn bitwise(&mut self, f: impl Fn(u8, u8) -> u8) -> StepResult {
        self.require(2)?;
        let b = self.pop()?;
        let a = self.pop()?;
        if a.len() != b.len() {
            return Err(ScriptError::InvalidStackOperation);
        }
        self.stack.push(a.iter().zip(&b).map(|(x, y)| f(*x, *y)).collect());
        Ok(())
    }

    fn shift_amount(num: &BigInt) -> StepResult<usize> {
        num.to_usize()
            .filter(|n| *n as u64 <= ScriptNum::MAX_SHIFT)
            .ok_or(ScriptError::InvalidShift)
    }

    /// Verify one stack signature against one stack public key
    fn check_sig(&mut self, pub_key: &[u8], sig: &[u8], exec_script: &[u8]) -> bool {
        let (Ok(pub_key), Ok(sig)) = (PubKey::from_slice(pub_key), TxSignature::from_bytes(sig)) else {
            return false;
        };
        let tx = self.tx;
        tx.verify_with_cache(self.n_in, &pub_key, &sig, exec_script, self.value, &mut *self.hash_cache)
    }

    fn step(&mut self, chunk: &ScriptChunk, opcode: Option<Opcode>, executing: bool) -> StepResult<Flow> {
        let Some(opcode) = opcode else {
            return Err(ScriptError::InvalidOpcode);
        };

        match opcode {
            Opcode::OpIf | Opcode::OpNotIf => {
                let mut value = false;
                if executing {
                    let buf = self.stack.pop().ok_or(ScriptError::UnbalancedConditional)?;
                    value = cast_to_bool(&buf);
                    if opcode == Opcode::OpNotIf {
                        value = !value;
                    }
                }
                self.if_stack.push(value);
            }
            Opcode::OpElse => {
                let top = self.if_stack.last_mut().ok_or(ScriptError::UnbalancedConditional)?;
                *top = !*top;
            }
            Opcode::OpEndIf => {
                self.if_stack.pop().ok_or(ScriptError::UnbalancedConditional)?;
            }

            // Constants
            Opcode::Op0 => self.stack.push(Vec::new()),
            Opcode::OpPushData1 | Opcode::OpPushData2 | Opcode::OpPushData4 => {
                let data = chunk.data().ok_or(ScriptError::InvalidOpcode)?.to_vec();
                self.stack.push(data);
            }
            Opcode::Op1Negate => self.push_num(BigInt::from(-1)),
            op if op.to_small_int().is_some() => {
                let n = op.to_small_int().unwrap_or_default();
                self.push_num(BigInt::from(n));
            }

            // Flow control
            Opcode::OpVerify => {
                self.require(1)?;
                let buf = self.pop()?;
                if !cast_to_bool(&buf) {
                    return Err(ScriptError::VerifyFailed);
                }
            }
            Opcode::OpReturn => return Ok(Flow::Return),

            // Stack
            Opcode::OpToAltStack => {
                self.require(1)?;
                let buf = self.pop()?;
                self.alt_stack.push(buf);
            }
            Opcode::OpFromAltStack => {
                let buf = self.alt_stack.pop().ok_or(ScriptError::InvalidStackOperation)?;
                self.stack.push(buf);
            }
            Opcode::Op2Drop => {
                self.require(2)?;
                self.stack.truncate(self.stack.len() - 2);
            }
            Opcode::Op2Dup => self.copy_from_depth(2, 2)?,
            Opcode::Op3Dup => self.copy_from_depth(3, 3)?,
            Opcode::Op2Over => self.copy_from_depth(4, 2)?,
            Opcode::Op2Rot => {
                // (x1 x2 x3 x4 x5 x6 -- x3 x4 x5 x6 x1 x2)
                self.require(6)?;
                let len = self.stack.len();
                let moved: Vec<_> = self.stack.drain(len - 6..len - 4).collect();
                self.stack.extend(moved);
            }
            Opcode::Op2Swap => {
                // (x1 x2 x3 x4 -- x3 x4 x1 x2)
                self.require(4)?;
                let len = self.stack.len();
                let moved: Vec<_> = self.stack.drain(len - 4..len - 2).collect();
                self.stack.extend(moved);
            }
            Opcode::OpIfDup => {
                let top = self.top()?.clone();
                if cast_to_bool(&top) {
                    self.stack.push(top);
                }
            }
            Opcode::OpDepth => self.push_num(BigInt::from(self.stack.len())),
            Opcode::OpDrop => {
                self.pop()?;
            }
            Opcode::OpDup => self.copy_from_depth(1, 1)?,
            Opcode::OpNip => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.remove(len - 2);
            }
            Opcode::OpOver => self.copy_from_depth(2, 1)?,
            Opcode::OpPick | Opcode::OpRoll => {
                self.require(1)?;
                let n = self
                    .pop_num()?
                    .to_usize()
                    .filter(|n| *n < self.stack.len())
                    .ok_or(ScriptError::InvalidStackOperation)?;
                let index = self.stack.len() - n - 1;
                let buf = if opcode == Opcode::OpPick {
                    self.stack[index].clone()
                } else {
                    self.stack.remove(index)
                };
                self.stack.push(buf);
            }
            Opcode::OpRot => {
                // (x1 x2 x3 -- x2 x3 x1)
                self.require(3)?;
                let buf = self.stack.remove(self.stack.len() - 3);
                self.stack.push(buf);
            }
            Opcode::OpSwap => {
                self.require(2)?;
                let buf = self.stack.remove(self.stack.len() - 2);
                self.stack.push(buf);
            }
            Opcode::OpTuck => {
                // (x1 x2 -- x2 x1 x2)
                self.require(2)?;
                let top = self.top()?.clone();
                self.stack.insert(self.stack.len() - 2, top);
            }

            // Splice
            Opcode::OpCat => {
                self.require(2)?;
                let b = self.pop()?;
                let mut a = self.pop()?;
                a.extend_from_slice(&b);
                self.stack.push(a);
            }
            Opcode::OpSubstr => {
                self.require(3)?;
                let len = self.pop_num()?;
                let offset = self.pop_num()?;
                let buf = self.pop()?;
                let range = match (offset.to_usize(), len.to_usize()) {
                    (Some(offset), Some(len)) if offset.checked_add(len).is_some_and(|end| end <= buf.len()) => {
                        offset..offset + len
                    }
                    _ => return Err(ScriptError::InvalidStackOperation),
                };
                self.stack.push(buf[range].to_vec());
            }
            Opcode::OpLeft | Opcode::OpRight => {
                self.require(2)?;
                let len = self.pop_num()?;
                let buf = self.pop()?;
                let len = len
                    .to_usize()
                    .filter(|len| *len <= buf.len())
                    .ok_or(ScriptError::InvalidStackOperation)?;
                let out = if opcode == Opcode::OpLeft {
                    buf[..len].to_vec()
                } else {
                    buf[buf.len() - len..].to_vec()
                };
                self.stack.push(out);
            }
            Opcode::OpSize => {
                let len = self.top()?.len();
                self.push_num(BigInt::from(len));
            }

            // Bitwise logic
            Opcode::OpInvert => {
                self.require(1)?;
                let buf = self.pop()?;
                self.stack.push(buf.iter().map(|b| !b).collect());
            }
            Opcode::OpAnd => self.bitwise(|a, b| a & b)?,
            Opcode::OpOr => self.bitwise(|a, b| a | b)?,
            Opcode::OpXor => self.bitwise(|a, b| a ^ b)?,
            Opcode::OpEqual | Opcode::OpEqualVerify => {
                self.require(2)?;
                let b = self.pop()?;
                let a = self.pop()?;
                if opcode == Opcode::OpEqual {
                    self.push_bool(a == b);
                } else if a != b {
                    return Err(ScriptError::VerifyFailed);
                }
            }

            // Arithmetic
            Opcode::Op1Add => self.unary_num(|a| a + 1)?,
            Opcode::Op1Sub => self.unary_num(|a| a - 1)?,
            Opcode::Op2Mul => self.unary_num(|a| a * 2)?,
            Opcode::Op2Div => self.unary_num(|a| a / 2)?,
            Opcode::OpNegate => self.unary_num(|a| -a)?,
            Opcode::OpAbs => self.unary_num(|a| a.abs())?,
            Opcode::OpNot => self.unary_num(|a| bool_num(a.is_zero()))?,
            Opcode::Op0NotEqual => self.unary_num(|a| bool_num(!a.is_zero()))?,
            Opcode::OpAdd => self.binary_num(|a, b| Ok(a + b))?,
            Opcode::OpSub => self.binary_num(|a, b| Ok(a - b))?,
            Opcode::OpMul => self.binary_num(|a, b| Ok(a * b))?,
            Opcode::OpDiv | Opcode::OpMod => self.binary_num(|a, b| {
                if b.is_zero() {
                    return Err(ScriptError::DivisionByZero);
                }
                // both truncate toward zero
                Ok(if opcode == Opcode::OpDiv { a / b } else { a % b })
            })?,
            Opcode::OpLShift => self.binary_num(|a, b| Ok(a << Self::shift_amount(&b)?))?,
            Opcode::OpRShift => self.binary_num(|a, b| Ok(a >> Self::shift_amount(&b)?))?,
            Opcode::OpBoolAnd => self.binary_num(|a, b| Ok(bool_num(!a.is_zero() && !b.is_zero())))?,
            Opcode::OpBoolOr => self.binary_num(|a, b| Ok(bool_num(!a.is_zero() || !b.is_zero())))?,
            Opcode::OpNumEqual => self.binary_num(|a, b| Ok(bool_num(a == b)))?,
            Opcode::OpNumEqualVerify => {
                self.require(2)?;
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                if a != b {
                    return Err(ScriptError::VerifyFailed);
                }
            }
            Opcode::OpNumNotEqual => self.binary_num(|a, b| Ok(bool_num(a != b)))?,
            Opcode::OpLessThan => self.binary_num(|a, b| Ok(bool_num(a < b)))?,
            Opcode::OpGreaterThan => self.binary_num(|a, b| Ok(bool_num(a > b)))?,
            Opcode::OpLessThanOrEqual => self.binary_num(|a, b| Ok(bool_num(a <= b)))?,
            Opcode::OpGreaterThanOrEqual => self.binary_num(|a, b| Ok(bool_num(a >= b)))?,
            Opcode::OpMin => self.binary_num(|a, b| Ok(a.min(b)))?,
            Opcode::OpMax => self.binary_num(|a, b| Ok(a.max(b)))?,
            Opcode::OpWithin => {
                // (x min max -- out)
                self.require(3)?;
                let max = self.pop_num()?;
                let min = self.pop_num()?;
                let x = self.pop_num()?;
                self.push_bool(x >= min && x < max);
            }

            // Crypto
            Opcode::OpBlake3 => {
                self.require(1)?;
                let buf = self.pop()?;
                self.stack.push(blake3_hash(&buf).to_vec());
            }
            Opcode::OpDoubleBlake3 => {
                self.require(1)?;
                let buf = self.pop()?;
                self.stack.push(double_blake3_hash(&buf).to_vec());
            }
            Opcode::OpCheckSig | Opcode::OpCheckSigVerify => {
                self.require(2)?;
                let pub_key = self.pop()?;
                if pub_key.len() != PubKey::SIZE {
                    return Err(ScriptError::InvalidPublicKeyLength);
                }
                let sig = self.pop()?;
                if sig.len() != TxSignature::SIZE {
                    return Err(ScriptError::InvalidSignatureLength);
                }
                let exec_script = self.script.to_bytes();
                let success = self.check_sig(&pub_key, &sig, &exec_script);
                self.push_bool(success);
                if opcode == Opcode::OpCheckSigVerify && !success {
                    return Err(ScriptError::VerifyFailed);
                }
            }
            Opcode::OpCheckMultiSig | Opcode::OpCheckMultiSigVerify => {
                let success = self.check_multisig()?;
                self.push_bool(success);
                if opcode == Opcode::OpCheckMultiSigVerify && !success {
                    return Err(ScriptError::VerifyFailed);
                }
            }

            // Locktime
            Opcode::OpCheckLockAbsVerify => {
                let required = ScriptNum::from_bytes(self.top()?);
                if required.is_negative() || BigInt::from(self.tx.lock_abs) < required.num {
                    return Err(ScriptError::LockNotSatisfied);
                }
            }
            Opcode::OpCheckLockRelVerify => {
                let required = ScriptNum::from_bytes(self.top()?);
                let lock_rel = self
                    .tx
                    .inputs
                    .get(self.n_in)
                    .map(|input| input.lock_rel)
                    .ok_or(ScriptError::LockNotSatisfied)?;
                if required.is_negative() || BigInt::from(lock_rel) < required.num {
                    return Err(ScriptError::LockNotSatisfied);
                }
            }

            _ => return Err(ScriptError::InvalidOpcode),
        }
        Ok(Flow::Next)
    }

    /// Push copies of `count` items starting `depth` from the top
    fn copy_from_depth(&mut self, depth: usize, count: usize) -> StepResult {
        self.require(depth)?;
        let start = self.stack.len() - depth;
        let copied: Vec<_> = self.stack[start..start + count].to_vec();
        self.stack.extend(copied);
        Ok(())
    }

    /// Stack: `<sig…> m <pubkey…> n`
    ///
    /// Each signature is matched against the remaining keys in the order
    /// they were popped; a matched key is consumed.
    fn check_multisig(&mut self) -> StepResult<bool> {
        self.require(1)?;
        let n_keys = self
            .pop_num()?
            .to_usize()
            .filter(|n| *n <= Self::MAX_MULTISIG_KEYS)
            .ok_or(ScriptError::InvalidKeyCount)?;
        self.require(n_keys + 1)?;

        let mut pub_keys = Vec::with_capacity(n_keys);
        for _ in 0..n_keys {
            let pub_key = self.pop()?;
            if pub_key.len() != PubKey::SIZE {
                return Err(ScriptError::InvalidPublicKeyLength);
            }
            pub_keys.push(pub_key);
        }

        let n_sigs = self
            .pop_num()?
            .to_usize()
            .filter(|n| *n <= n_keys)
            .ok_or(ScriptError::InvalidSigCount)?;
        self.require(n_sigs)?;

        let mut sigs = Vec::with_capacity(n_sigs);
        for _ in 0..n_sigs {
            let sig = self.pop()?;
            if sig.len() != TxSignature::SIZE {
                return Err(ScriptError::InvalidSignatureLength);
            }
            sigs.push(sig);
        }

        let exec_script = self.script.to_bytes();
        let mut matched = 0;
        for sig in &sigs {
            let found = (0..pub_keys.len())
                .find(|&j| self.check_sig(&pub_keys[j], sig, &exec_script));
            if let Some(j) = found {
                pub_keys.remove(j);
                matched += 1;
            }
        }
        Ok(matched == n_sigs)
    }
}
