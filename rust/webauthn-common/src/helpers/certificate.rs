use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p256::pkcs8::EncodePublicKey;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::str::FromStr;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::asn1::{ObjectIdentifier, OctetStringRef, UtcTime};
use x509_cert::der::oid::AssociatedOid;
use x509_cert::der::{Decode, Encode, Length, Writer};
use x509_cert::ext::pkix::ExtendedKeyUsage;
use x509_cert::ext::{AsExtension, Extension};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};

const ONE_YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// DER SubjectPublicKeyInfo for a P-256 key.
pub fn p256_spki(key: &VerifyingKey) -> anyhow::Result<Vec<u8>> {
    Ok(key.to_public_key_der()?.into_vec())
}

/// Validity window between two offsets from the Unix epoch.
pub fn validity_between(not_before: Duration, not_after: Duration) -> anyhow::Result<Validity> {
    Ok(Validity {
        not_before: Time::UtcTime(UtcTime::from_unix_duration(not_before)?),
        not_after: Time::UtcTime(UtcTime::from_unix_duration(not_after)?),
    })
}

/// A P-256 certificate authority that mints attestation certificates.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    signing_key: SigningKey,
    name: Name,
    certificate: Vec<u8>,
}

impl CertificateAuthority {
    /// Create a self-signed root authority whose key is derived from `seed`.
    pub fn new(seed: u64, common_name: &str) -> anyhow::Result<Self> {
        let signing_key = SigningKey::random(&mut ChaCha20Rng::seed_from_u64(seed));
        let name = Name::from_str(&format!("CN={common_name}"))?;
        let certificate = build(
            Profile::Root,
            seed_serial(seed)?,
            Validity::from_now(ONE_YEAR)?,
            name.clone(),
            SubjectPublicKeyInfoOwned::from_key(*signing_key.verifying_key())?,
            &signing_key,
            |_| Ok(()),
        )?;
        Ok(Self {
            signing_key,
            name,
            certificate,
        })
    }

    /// Issue an intermediate authority signed by this one that may only
    /// issue end-entity certificates.
    pub fn issue_intermediate(&self, seed: u64, common_name: &str) -> anyhow::Result<Self> {
        self.issue_intermediate_with_path_len(seed, common_name, Some(0))
    }

    /// Issue an intermediate authority with the given `pathLenConstraint`.
    pub fn issue_intermediate_with_path_len(
        &self,
        seed: u64,
        common_name: &str,
        path_len_constraint: Option<u8>,
    ) -> anyhow::Result<Self> {
        self.issue_signer(
            seed,
            common_name,
            Profile::SubCA {
                issuer: self.name.clone(),
                path_len_constraint,
            },
        )
    }

    /// Issue an end-entity certificate named `CN=<common_name>` whose key
    /// can still be used to sign further certificates.
    pub fn issue_end_entity(&self, seed: u64, common_name: &str) -> anyhow::Result<Self> {
        self.issue_signer(
            seed,
            common_name,
            Profile::Leaf {
                issuer: self.name.clone(),
                enable_key_agreement: false,
                enable_key_encipherment: false,
            },
        )
    }

    fn issue_signer(&self, seed: u64, common_name: &str, profile: Profile) -> anyhow::Result<Self> {
        let signing_key = SigningKey::random(&mut ChaCha20Rng::seed_from_u64(seed));
        let name = Name::from_str(&format!("CN={common_name}"))?;
        let certificate = build(
            profile,
            seed_serial(seed)?,
            Validity::from_now(ONE_YEAR)?,
            name.clone(),
            SubjectPublicKeyInfoOwned::from_key(*signing_key.verifying_key())?,
            &self.signing_key,
            |_| Ok(()),
        )?;
        Ok(Self {
            signing_key,
            name,
            certificate,
        })
    }

    /// DER encoding of this authority's certificate.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Issue an end-entity certificate.
    pub fn issue(&self, leaf: LeafCertificate) -> anyhow::Result<Vec<u8>> {
        let subject = if leaf.subject.is_empty() {
            Name::default()
        } else {
            Name::from_str(&leaf.subject)?
        };
        let validity = match leaf.validity {
            Some(validity) => validity,
            None => Validity::from_now(ONE_YEAR)?,
        };
        build(
            Profile::Leaf {
                issuer: self.name.clone(),
                enable_key_agreement: false,
                enable_key_encipherment: false,
            },
            SerialNumber::new(&[0x10, leaf.serial])?,
            validity,
            subject,
            SubjectPublicKeyInfoOwned::from_der(&leaf.public_key)?,
            &self.signing_key,
            |builder| {
                if let Some(aaguid) = leaf.aaguid {
                    builder.add_extension(&AaguidExtension(aaguid))?;
                }
                if let Some(description) = &leaf.key_description {
                    builder.add_extension(&AndroidKeyDescription(description.clone()))?;
                }
                if !leaf.extended_key_usage.is_empty() {
                    builder.add_extension(&ExtendedKeyUsage(leaf.extended_key_usage.clone()))?;
                }
                Ok(())
            },
        )
    }
}

/// Parameters for an end-entity certificate.
#[derive(Debug, Clone)]
pub struct LeafCertificate {
    subject: String,
    public_key: Vec<u8>,
    serial: u8,
    validity: Option<Validity>,
    aaguid: Option<[u8; 16]>,
    key_description: Option<Vec<u8>>,
    extended_key_usage: Vec<ObjectIdentifier>,
}

impl LeafCertificate {
    /// A leaf for the DER SubjectPublicKeyInfo `public_key` with an empty
    /// subject.
    pub fn new(public_key: Vec<u8>) -> Self {
        Self {
            subject: String::new(),
            public_key,
            serial: 1,
            validity: None,
            aaguid: None,
            key_description: None,
            extended_key_usage: Vec::new(),
        }
    }

    /// Set the subject, as an RFC 4514 string such as `CN=attest.android.com`.
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_owned();
        self
    }

    /// Set the serial number.
    pub fn serial(mut self, serial: u8) -> Self {
        self.serial = serial;
        self
    }

    /// Override the default one-year validity starting now.
    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Add the FIDO AAGUID extension.
    pub fn aaguid(mut self, aaguid: [u8; 16]) -> Self {
        self.aaguid = Some(aaguid);
        self
    }

    /// Add the Android key attestation extension with DER `description`.
    pub fn key_description(mut self, description: Vec<u8>) -> Self {
        self.key_description = Some(description);
        self
    }

    /// Add an extended key usage purpose.
    pub fn extended_key_usage(mut self, purpose: ObjectIdentifier) -> Self {
        self.extended_key_usage.push(purpose);
        self
    }
}

/// The `id-fido-gen-ce-aaguid` certificate extension.
#[derive(Debug, Clone, Copy)]
pub struct AaguidExtension(pub [u8; 16]);

impl AssociatedOid for AaguidExtension {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.45724.1.1.4");
}

impl Encode for AaguidExtension {
    fn encoded_len(&self) -> x509_cert::der::Result<Length> {
        OctetStringRef::new(&self.0)?.encoded_len()
    }

    fn encode(&self, encoder: &mut impl Writer) -> x509_cert::der::Result<()> {
        OctetStringRef::new(&self.0)?.encode(encoder)
    }
}

impl AsExtension for AaguidExtension {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

/// The Android key attestation extension, carrying a pre-encoded
/// `KeyDescription` sequence.
#[derive(Debug, Clone)]
pub struct AndroidKeyDescription(pub Vec<u8>);

impl AssociatedOid for AndroidKeyDescription {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.11129.2.1.17");
}

impl Encode for AndroidKeyDescription {
    fn encoded_len(&self) -> x509_cert::der::Result<Length> {
        Length::try_from(self.0.len())
    }

    fn encode(&self, encoder: &mut impl Writer) -> x509_cert::der::Result<()> {
        encoder.write(&self.0)
    }
}

impl AsExtension for AndroidKeyDescription {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

/// A minimal Android `KeyDescription` whose attestation challenge is
/// `challenge`.
pub fn android_key_description(challenge: &[u8]) -> Vec<u8> {
    use super::der_tlv;

    let mut content = Vec::new();
    // attestationVersion, attestationSecurityLevel
    content.extend(der_tlv(0x02, &[3]));
    content.extend(der_tlv(0x0a, &[1]));
    // keymasterVersion, keymasterSecurityLevel
    content.extend(der_tlv(0x02, &[4]));
    content.extend(der_tlv(0x0a, &[1]));
    content.extend(der_tlv(0x04, challenge));
    // uniqueId
    content.extend(der_tlv(0x04, &[]));
    // softwareEnforced, teeEnforced
    content.extend(der_tlv(0x30, &[]));
    content.extend(der_tlv(0x30, &[]));
    der_tlv(0x30, &content)
}

fn seed_serial(seed: u64) -> anyhow::Result<SerialNumber> {
    let bytes = seed.to_be_bytes();
    Ok(SerialNumber::new(&[&[0x01], &bytes[..]].concat())?)
}

fn build(
    profile: Profile,
    serial: SerialNumber,
    validity: Validity,
    subject: Name,
    public_key: SubjectPublicKeyInfoOwned,
    signer: &SigningKey,
    extend: impl FnOnce(&mut CertificateBuilder<'_, SigningKey>) -> anyhow::Result<()>,
) -> anyhow::Result<Vec<u8>> {
    let mut builder =
        CertificateBuilder::new(profile, serial, validity, subject, public_key, signer)?;
    extend(&mut builder)?;
    let certificate = builder.build::<DerSignature>()?;
    Ok(certificate.to_der()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_cert::Certificate;
    use x509_cert::ext::pkix::BasicConstraints;

    #[test]
    fn it_issues_a_leaf_with_an_aaguid() {
        let root = CertificateAuthority::new(1, "Test Root").unwrap();
        let leaf_key = SigningKey::random(&mut ChaCha20Rng::seed_from_u64(2));
        let der = root
            .issue(
                LeafCertificate::new(p256_spki(leaf_key.verifying_key()).unwrap())
                    .subject("CN=Leaf")
                    .aaguid([9u8; 16]),
            )
            .unwrap();

        let certificate = Certificate::from_der(&der).unwrap();
        let extensions = certificate.tbs_certificate.extensions.unwrap();
        let aaguid = extensions
            .iter()
            .find(|extension| extension.extn_id == AaguidExtension::OID)
            .unwrap();
        assert_eq!(aaguid.extn_value.as_bytes(), &der_octets(&[9u8; 16])[..]);
    }

    #[test]
    fn intermediates_name_their_issuer() {
        let root = CertificateAuthority::new(1, "Test Root").unwrap();
        let intermediate = root.issue_intermediate(2, "Test Intermediate").unwrap();
        let certificate = Certificate::from_der(intermediate.certificate()).unwrap();
        assert_eq!(certificate.tbs_certificate.issuer, root.name);
    }

    #[test]
    fn end_entities_can_sign_but_are_not_authorities() {
        let root = CertificateAuthority::new(1, "Test Root").unwrap();
        let end_entity = root.issue_end_entity(3, "Test Leaf").unwrap();
        let certificate = Certificate::from_der(end_entity.certificate()).unwrap();
        let constraints = certificate
            .tbs_certificate
            .extensions
            .unwrap()
            .into_iter()
            .find(|extension| extension.extn_id == BasicConstraints::OID)
            .map(|extension| BasicConstraints::from_der(extension.extn_value.as_bytes()).unwrap());
        assert!(!constraints.is_some_and(|constraints| constraints.ca));

        let forged = end_entity
            .issue(LeafCertificate::new(p256_spki(end_entity.signing_key.verifying_key()).unwrap()))
            .unwrap();
        let forged = Certificate::from_der(&forged).unwrap();
        assert_eq!(forged.tbs_certificate.issuer, end_entity.name);
    }

    fn der_octets(bytes: &[u8]) -> Vec<u8> {
        super::super::der_tlv(0x04, bytes)
    }
}
