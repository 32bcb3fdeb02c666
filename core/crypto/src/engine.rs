//! Streaming symmetric cipher engines.
//!
//! Every cipher descriptor builds one of these. Engines accept input in
//! arbitrary slices, append whatever output is ready to the caller's buffer
//! and emit the final block (with PKCS#7 padding for block modes) on
//! [`CipherEngine::finalize`].

use cipher::consts::U16;
use cipher::{
    Block, BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut,
    BlockSizeUser, InvalidLength, KeyInit, KeyIvInit, StreamCipher,
};

use pipecrypt_common::{CryptoError, Error, Library, Reason, Result};

use crate::cipher::Direction;

/// A running encryption or decryption transform.
pub trait CipherEngine: Send {
    /// Feed `input`, appending ready output to `output`.
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;

    /// Flush the final block.
    ///
    /// # Errors
    /// - `CipherIntegrity` when decrypting and the padding does not check out
    fn finalize(&mut self, output: &mut Vec<u8>) -> Result<()>;
}

/// Block cipher primitives usable in every mode.
pub(crate) trait BlockPrimitive:
    BlockCipher + BlockEncrypt + BlockDecrypt + KeyInit + Send + 'static
{
}

impl<T> BlockPrimitive for T where
    T: BlockCipher + BlockEncrypt + BlockDecrypt + KeyInit + Send + 'static
{
}

pub(crate) type EngineFactory =
    fn(&[u8], &[u8], Direction) -> std::result::Result<Box<dyn CipherEngine>, InvalidLength>;

pub(crate) fn build_ecb<C: BlockPrimitive>(
    key: &[u8],
    _iv: &[u8],
    direction: Direction,
) -> std::result::Result<Box<dyn CipherEngine>, InvalidLength> {
    let engine: Box<dyn CipherEngine> = match direction {
        Direction::Encrypt => Box::new(BlockwiseEncryptor::new(
            ecb::Encryptor::<C>::new_from_slice(key)?,
            true,
        )),
        Direction::Decrypt => Box::new(BlockwiseDecryptor::new(
            ecb::Decryptor::<C>::new_from_slice(key)?,
            true,
        )),
    };
    Ok(engine)
}

pub(crate) fn build_cbc<C: BlockPrimitive>(
    key: &[u8],
    iv: &[u8],
    direction: Direction,
) -> std::result::Result<Box<dyn CipherEngine>, InvalidLength> {
    let engine: Box<dyn CipherEngine> = match direction {
        Direction::Encrypt => Box::new(BlockwiseEncryptor::new(
            cbc::Encryptor::<C>::new_from_slices(key, iv)?,
            true,
        )),
        Direction::Decrypt => Box::new(BlockwiseDecryptor::new(
            cbc::Decryptor::<C>::new_from_slices(key, iv)?,
            true,
        )),
    };
    Ok(engine)
}

pub(crate) fn build_cfb8<C: BlockPrimitive>(
    key: &[u8],
    iv: &[u8],
    direction: Direction,
) -> std::result::Result<Box<dyn CipherEngine>, InvalidLength> {
    let engine: Box<dyn CipherEngine> = match direction {
        Direction::Encrypt => Box::new(BlockwiseEncryptor::new(
            cfb8::Encryptor::<C>::new_from_slices(key, iv)?,
            false,
        )),
        Direction::Decrypt => Box::new(BlockwiseDecryptor::new(
            cfb8::Decryptor::<C>::new_from_slices(key, iv)?,
            false,
        )),
    };
    Ok(engine)
}

pub(crate) fn build_cfb<C: BlockPrimitive>(
    key: &[u8],
    iv: &[u8],
    direction: Direction,
) -> std::result::Result<Box<dyn CipherEngine>, InvalidLength> {
    let engine: Box<dyn CipherEngine> = match direction {
        Direction::Encrypt => Box::new(CfbEngine::Encrypt(
            cfb_mode::BufEncryptor::<C>::new_from_slices(key, iv)?,
        )),
        Direction::Decrypt => Box::new(CfbEngine::Decrypt(
            cfb_mode::BufDecryptor::<C>::new_from_slices(key, iv)?,
        )),
    };
    Ok(engine)
}

pub(crate) fn build_ofb<C: BlockPrimitive>(
    key: &[u8],
    iv: &[u8],
    _direction: Direction,
) -> std::result::Result<Box<dyn CipherEngine>, InvalidLength> {
    if iv.len() != C::block_size() {
        return Err(InvalidLength);
    }
    Ok(Box::new(OfbEngine {
        cipher: C::new_from_slice(key)?,
        keystream: Block::<C>::clone_from_slice(iv),
        used: C::block_size(),
    }))
}

pub(crate) fn build_ctr<C>(
    key: &[u8],
    iv: &[u8],
    _direction: Direction,
) -> std::result::Result<Box<dyn CipherEngine>, InvalidLength>
where
    C: BlockPrimitive + BlockSizeUser<BlockSize = U16>,
{
    Ok(Box::new(KeystreamEngine(ctr::Ctr128BE::<C>::new_from_slices(
        key, iv,
    )?)))
}

fn integrity_failure(reason: Reason) -> Error {
    tracing::warn!("cipher finalization failed: {}", reason.description());
    Error::CipherIntegrity(CryptoError::new(Library::Evp, reason))
}

/// Block mode encryption that buffers partial blocks.
struct BlockwiseEncryptor<M> {
    mode: M,
    pending: Vec<u8>,
    padding: bool,
}

impl<M: BlockEncryptMut> BlockwiseEncryptor<M> {
    fn new(mode: M, padding: bool) -> Self {
        Self {
            mode,
            pending: Vec::with_capacity(M::block_size()),
            padding,
        }
    }

    fn process(&mut self, upto: usize, output: &mut Vec<u8>) {
        for chunk in self.pending[..upto].chunks_exact(M::block_size()) {
            let mut block = Block::<M>::clone_from_slice(chunk);
            self.mode.encrypt_block_mut(&mut block);
            output.extend_from_slice(&block);
        }
        self.pending.drain(..upto);
    }
}

impl<M: BlockEncryptMut + Send> CipherEngine for BlockwiseEncryptor<M> {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        self.pending.extend_from_slice(input);
        let full = self.pending.len() - self.pending.len() % M::block_size();
        self.process(full, output);
        Ok(())
    }

    fn finalize(&mut self, output: &mut Vec<u8>) -> Result<()> {
        let bs = M::block_size();
        if self.padding {
            // PKCS#7: always at least one byte of padding
            let pad = bs - self.pending.len();
            self.pending.resize(bs, pad as u8);
            self.process(bs, output);
        } else if !self.pending.is_empty() {
            self.pending.clear();
            return Err(Error::io(Library::Evp, Reason::WrongFinalBlockLength));
        }
        Ok(())
    }
}

/// Block mode decryption. Holds back the last full block until finalization
/// so the padding can be checked and stripped.
struct BlockwiseDecryptor<M> {
    mode: M,
    pending: Vec<u8>,
    padding: bool,
}

impl<M: BlockDecryptMut> BlockwiseDecryptor<M> {
    fn new(mode: M, padding: bool) -> Self {
        Self {
            mode,
            pending: Vec::with_capacity(M::block_size() * 2),
            padding,
        }
    }

    fn process(&mut self, upto: usize, output: &mut Vec<u8>) {
        for chunk in self.pending[..upto].chunks_exact(M::block_size()) {
            let mut block = Block::<M>::clone_from_slice(chunk);
            self.mode.decrypt_block_mut(&mut block);
            output.extend_from_slice(&block);
        }
        self.pending.drain(..upto);
    }
}

impl<M: BlockDecryptMut + Send> CipherEngine for BlockwiseDecryptor<M> {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let bs = M::block_size();
        self.pending.extend_from_slice(input);
        let ready = if self.padding {
            self.pending.len().saturating_sub(1) / bs * bs
        } else {
            self.pending.len() - self.pending.len() % bs
        };
        self.process(ready, output);
        Ok(())
    }

    fn finalize(&mut self, output: &mut Vec<u8>) -> Result<()> {
        let bs = M::block_size();
        if !self.padding {
            if self.pending.is_empty() {
                return Ok(());
            }
            self.pending.clear();
            return Err(Error::io(Library::Evp, Reason::WrongFinalBlockLength));
        }
        if self.pending.len() != bs {
            self.pending.clear();
            return Err(integrity_failure(Reason::WrongFinalBlockLength));
        }

        let mut last = Vec::with_capacity(bs);
        self.process(bs, &mut last);
        let pad = usize::from(last[bs - 1]);
        if pad == 0 || pad > bs || !last[bs - pad..].iter().all(|&b| usize::from(b) == pad) {
            return Err(integrity_failure(Reason::BadDecrypt));
        }
        output.extend_from_slice(&last[..bs - pad]);
        Ok(())
    }
}

/// Full-block cipher feedback, buffered so any input length works.
enum CfbEngine<C: BlockEncryptMut + BlockCipher> {
    Encrypt(cfb_mode::BufEncryptor<C>),
    Decrypt(cfb_mode::BufDecryptor<C>),
}

impl<C: BlockEncryptMut + BlockCipher + Send> CipherEngine for CfbEngine<C> {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let start = output.len();
        output.extend_from_slice(input);
        match self {
            CfbEngine::Encrypt(cfb) => cfb.encrypt(&mut output[start..]),
            CfbEngine::Decrypt(cfb) => cfb.decrypt(&mut output[start..]),
        }
        Ok(())
    }

    fn finalize(&mut self, _output: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

/// Output feedback: the IV is repeatedly encrypted to produce a keystream.
struct OfbEngine<C: BlockEncrypt> {
    cipher: C,
    keystream: Block<C>,
    used: usize,
}

impl<C: BlockEncrypt + Send> CipherEngine for OfbEngine<C> {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        output.reserve(input.len());
        for &byte in input {
            if self.used == C::block_size() {
                self.cipher.encrypt_block(&mut self.keystream);
                self.used = 0;
            }
            output.push(byte ^ self.keystream[self.used]);
            self.used += 1;
        }
        Ok(())
    }

    fn finalize(&mut self, _output: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

/// Any synchronous stream cipher (counter mode).
struct KeystreamEngine<S>(S);

impl<S: StreamCipher + Send> CipherEngine for KeystreamEngine<S> {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let start = output.len();
        output.extend_from_slice(input);
        self.0
            .try_apply_keystream(&mut output[start..])
            .map_err(|_| Error::io(Library::Evp, Reason::UnsupportedMethod))
    }

    fn finalize(&mut self, _output: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}
