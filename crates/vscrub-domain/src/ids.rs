use core::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest32([u8; 32]);

impl Digest32 {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest32").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Digest32);

        impl $name {
            pub const fn from_digest(digest: Digest32) -> Self {
                Self(digest)
            }

            pub const fn as_digest(&self) -> &Digest32 {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&self.0.to_hex())
                    .finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_newtype!(IndexId);
id_newtype!(RunId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest32_displays_as_lowercase_hex() {
        let mut bytes = [0_u8; 32];
        bytes[0] = 0xAB;
        bytes[31] = 0x01;
        let digest = Digest32::from_bytes(bytes);
        let hex = digest.to_hex();

        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("ab00"));
        assert!(hex.ends_with("01"));
    }

    #[test]
    fn id_newtypes_delegate_to_digest() {
        let digest = Digest32::from_bytes([7_u8; 32]);
        let id = IndexId::from_digest(digest);
        assert_eq!(id.to_hex(), digest.to_hex());
        assert_eq!(id.to_string(), digest.to_string());
        assert_eq!(id.as_digest(), &digest);
    }
}
