//! Cipher Transform: streaming AES-256-CBC with PKCS#7 padding
//!
//! Input is processed in `CHUNK_SIZE` pieces, so memory use does not depend on
//! file size. There is no authentication tag: a wrong key or tampered
//! ciphertext is only noticed when the final block fails to unpad.

use std::fmt;
use std::io::{ErrorKind, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::consts::{BLOCK_LEN, CHUNK_SIZE};
use crate::core::key::KeyMaterial;
use crate::error::{CoreError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Per-file initialization vector
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iv([u8; BLOCK_LEN]);

impl Iv {
    pub fn random() -> Self {
        let mut bytes = [0u8; BLOCK_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Iv(bytes)
    }

    pub fn from_bytes(bytes: [u8; BLOCK_LEN]) -> Self {
        Iv(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_base64(text: &str) -> std::result::Result<Self, String> {
        let decoded = STANDARD
            .decode(text.trim())
            .map_err(|e| format!("not valid base64: {e}"))?;
        let bytes: [u8; BLOCK_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| format!("expected {BLOCK_LEN} bytes, got {}", decoded.len()))?;
        Ok(Iv(bytes))
    }
}

impl fmt::Debug for Iv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iv({})", self.to_base64())
    }
}

/// One key configuration, reused for every file of a batch
///
/// Each `encrypt` call draws its own IV; two ciphertexts never share one.
pub struct Transform<'k> {
    key: &'k KeyMaterial,
}

impl<'k> Transform<'k> {
    pub fn new(key: &'k KeyMaterial) -> Self {
        Transform { key }
    }

    /// Encrypt `input` into `output` under a fresh IV and return that IV
    pub fn encrypt<R: Read, W: Write>(&self, input: R, output: W) -> Result<Iv> {
        let iv = Iv::random();
        encrypt_with_iv(input, output, self.key, &iv)?;
        Ok(iv)
    }

    pub fn decrypt<R: Read, W: Write>(&self, input: R, output: W, iv: &Iv) -> Result<()> {
        decrypt_stream(input, output, self.key, iv)
    }
}

/// Encrypt a whole stream under a fresh random IV, returning the IV used
pub fn encrypt_stream<R: Read, W: Write>(input: R, output: W, key: &KeyMaterial) -> Result<Iv> {
    Transform::new(key).encrypt(input, output)
}

pub(crate) fn encrypt_with_iv<R: Read, W: Write>(
    mut input: R,
    output: W,
    key: &KeyMaterial,
    iv: &Iv,
) -> Result<()> {
    let mut writer = EncryptWriter::with_iv(output, key, *iv);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = read_full(&mut input, &mut buf)?;
        writer.write_all(&buf[..n]).map_err(stream_err)?;
        if n < CHUNK_SIZE {
            break;
        }
    }
    writer.finish()?;
    Ok(())
}

/// Write adapter that encrypts everything written through it
///
/// Complete blocks are forwarded to `inner` as they arrive, so at most one
/// write's worth of data is buffered. `finish` pads and writes the last block;
/// dropping the writer without calling it leaves a truncated ciphertext.
pub struct EncryptWriter<W: Write> {
    enc: Aes256CbcEnc,
    inner: W,
    pending: Vec<u8>,
    iv: Iv,
}

impl<W: Write> EncryptWriter<W> {
    /// Start a ciphertext under a fresh random IV
    pub fn new(inner: W, key: &KeyMaterial) -> Self {
        Self::with_iv(inner, key, Iv::random())
    }

    pub(crate) fn with_iv(inner: W, key: &KeyMaterial, iv: Iv) -> Self {
        EncryptWriter {
            enc: Aes256CbcEnc::new(key.expose_secret().into(), iv.as_bytes().into()),
            inner,
            pending: Vec::with_capacity(CHUNK_SIZE + BLOCK_LEN),
            iv,
        }
    }

    pub fn iv(&self) -> Iv {
        self.iv
    }

    /// Pad and write the final block, returning the IV and the inner writer
    pub fn finish(self) -> Result<(Iv, W)> {
        let EncryptWriter {
            enc,
            mut inner,
            mut pending,
            iv,
        } = self;
        let n = pending.len();
        pending.resize(n + BLOCK_LEN, 0);
        let tail = enc
            .encrypt_padded_mut::<Pkcs7>(&mut pending, n)
            .map_err(|_| CoreError::Crypto("padding failed".into()))?;
        inner.write_all(tail).map_err(stream_err)?;
        inner.flush().map_err(stream_err)?;
        Ok((iv, inner))
    }
}

impl<W: Write> Write for EncryptWriter<W> {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(data);
        let whole = self.pending.len() - self.pending.len() % BLOCK_LEN;
        for block in self.pending[..whole].chunks_exact_mut(BLOCK_LEN) {
            self.enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        self.inner.write_all(&self.pending[..whole])?;
        self.pending.drain(..whole);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypt a whole stream with the IV it was encrypted under
///
/// The last block is held back until EOF so its padding can be checked.
pub fn decrypt_stream<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    key: &KeyMaterial,
    iv: &Iv,
) -> Result<()> {
    let mut dec = Aes256CbcDec::new(key.expose_secret().into(), iv.as_bytes().into());
    let mut buf = vec![0u8; BLOCK_LEN + CHUNK_SIZE];
    let mut carry = 0;

    loop {
        let n = read_full(&mut input, &mut buf[carry..carry + CHUNK_SIZE])?;
        let total = carry + n;

        if n < CHUNK_SIZE {
            if total == 0 || total % BLOCK_LEN != 0 {
                return Err(CoreError::Crypto(format!(
                    "ciphertext length is not a positive multiple of {BLOCK_LEN}"
                )));
            }
            let last = total - BLOCK_LEN;
            for block in buf[..last].chunks_exact_mut(BLOCK_LEN) {
                dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            output.write_all(&buf[..last]).map_err(stream_err)?;
            let tail = dec
                .decrypt_padded_mut::<Pkcs7>(&mut buf[last..total])
                .map_err(|_| CoreError::Crypto("bad padding (wrong key, IV or corrupt data)".into()))?;
            output.write_all(tail).map_err(stream_err)?;
            output.flush().map_err(stream_err)?;
            return Ok(());
        }

        let keep_from = total - BLOCK_LEN;
        for block in buf[..keep_from].chunks_exact_mut(BLOCK_LEN) {
            dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        output.write_all(&buf[..keep_from]).map_err(stream_err)?;
        buf.copy_within(keep_from..total, 0);
        carry = BLOCK_LEN;
    }
}

/// Fill `buf` unless EOF comes first; returns the number of bytes read
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(stream_err(e)),
        }
    }
    Ok(filled)
}

fn stream_err(e: std::io::Error) -> CoreError {
    CoreError::Stream(e)
}
