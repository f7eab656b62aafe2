//! Deterministic RSA key fixtures for testing
//!
//! Two fixed 2048-bit RSA keys, stored as base64 DER exactly as a trust store
//! would return a certificate payload:
//! - the primary key in PKCS#8 form
//! - the secondary key in PKCS#1 form
//!
//! These keys are test-only and must never be used outside tests.

use idp_client::crypto::Certificate;

/// Primary signing key (PKCS#8 `PrivateKeyInfo`, base64 DER).
pub const PRIMARY_KEY_PKCS8_B64: &str = concat!(
    "MIIEvQIBADANBgkqhkiG9w0BAQEFAASCBKcwggSjAgEAAoIBAQCWSsbH5Qy8ye3upzBWsxLL5NMw",
    "vgWf5BBVrf3cUHhG4w3AHSEnnyk2S34vnpwXqXq2RUTFZYkynTliB8DtOTYNabJd0hYSTA5mnaWL",
    "9nBxE6QB7TV9Aq9dIlHCMhgZH3m0eAMaAMTSiKt3yIIrS1tbLwSUzmo8ix79r2ip1G8IIEXgxVnr",
    "nE5rjDcxxxkHGciD2/WaPTX5PyWAyniCDjxyvJgRCJDatwrltIRJv0LfO0PUigquCdBiV6t1FGLl",
    "wlZm/aIyoGdTa64oxz7yskhkRh9pxCHrH3GR56to2czxaTXJM5tu7mHTEnO+RR0e/YV59/NrTsHa",
    "PVxV4+Wa1/83AgMBAAECggEAAPcuZvHPn8FYL/X2i9DmPM1ncGiJJD82qFU9ADjGbLQe0PEWzBmf",
    "sV7Rjv7ucZSktv08QYKzH6ayIGJGHPfgoyvZKEFcss+mZ/MspnucFycT+uYVC/QnSscOMweZGs1S",
    "Q2vEFx9WGXu9TA+Ewfl4PciZvPSeyjv6JvjptrHcP2Q8L8ybTPpPzA0kRJ2EwmP2NKiabDETT6IY",
    "FU5JWo7T6+JWo3xd+k/ddWQWaMxuHPEt8/n/T00iDA7/+xb33tpXIntHuQyoj64dJvFJFP19ORDE",
    "KMEf6T96q2KqwHKoTJUMSrClNdQuhi+QWHvyH+dCesvSQREa19dFuvdWmUFE2QKBgQDL7YpCRRLN",
    "whKAEYtNX/RU8rKYC5RRHicsj6LVl3jSOLUWYdRSfMs2gDLjZPfUSZP3oXn0NOr18S3QAqwVppT7",
    "vh4Ked0oEwu9y2x9vsdRvlmrwnnhsIgfAGkvnI02c4E70CQqE+4gRKbWtVBB+1AGu6SZ2WZELwrU",
    "HfcUTUrp+wKBgQC8qyUhUisPlVuPbeeSN+7LZ1nDYCkmqOZJpHZkyVR622VuVbS+kYeiRGf+TLRu",
    "Jrn2zSqgpbBsMoJoycJ3oce4QobGn3+vBhYigs+sMcxbBXqkbkzphZ5Ek2Xso0ZMnwGq1OBc5jEp",
    "SLDjeIZK/US8RjIPQNLtxTukLzP2DpeW9QKBgCzes1EpiZ2kWhW7xn7b4hLe49T4l0XR8KSpZhbB",
    "IWCAAbhPBjywILZ5Nrk5+h3HorsV2JOXISvESWQ/ckXBRX6uskVz0umCZ073d4Ojeo/N5kUYoWC7",
    "SvgnSv2i4J9egsz6Wzq27+pBsMQFWQdrmIwitXD0mL/f6e4KOddJunYJAoGATbvODo6GQ2NsWAoW",
    "UT5OWuv4JfFmwxDv4QOr7BavgfcHMZCKacIYOhkpJ7N+26uFD1S07X+W0t10sav/Pb8gRKDUWt24",
    "g+pkEFAJNI9H/XCieUEg2048SVDZu8gB3Oveif4vetc1Bid3CiHMYvU67r+VPIee4GxVCG6SYBzf",
    "BEkCgYEAjgaw0Zd1MM3cHKPGujox7ykwpLy/SoFUQgMSpOzEX/QTwqC3QJF79lP7zsAXkwVCX/KI",
    "AZSqkLPGHJbJbANjgtInnz7rgT6AnL8SVT68Mak7itv5J6ZDnvfSYC7AnoMwg98txacm0VkzvbF7",
    "ns+fj5V7cNQV8MM6FlhDlPXIezg=",
);

/// Secondary signing key (PKCS#1 `RSAPrivateKey`, base64 DER).
pub const SECONDARY_KEY_PKCS1_B64: &str = concat!(
    "MIIEpAIBAAKCAQEAw/24KQaT72l196/XwUYofxsuLvhsFAy/qAq3+zYAxYg3C3gBWYGVHu2grkdD",
    "dPSXG5lmLjQFF4DkIsOmOKno50bhv3goZEo0su3Seyp4ZF1eea0/sWr+zSA6Hi8yDsXO0dm1iSNG",
    "saYDD+g2yOo/xBxID0c+yVdzarIDo/YO8yf+VYmJSQUW3czT0/7+MwxHb8XWB/Bf9tsmgLILMZfs",
    "LHBm5krqd8qnn8qR+1JKXyBUz/TFopvmoKJEJrNtqLaq4dp5ejLDqRwoZP3pwu5b2+SNE/fOY6gG",
    "FECZLvuktiJNai+iPGbOTEp/5KRB0LIMI5RmRskKPFahY+bwRkEY9wIDAQABAoIBAAVEPByAPp2x",
    "Z8oc485CBoFbWI4XXLaG0BtbWQufnCOQlXslJduaZ0h9ejCsKqCuMeWRS9L0JhmLlabdw5I70+/0",
    "Hx74KXuQ9huyX8nTwcy05Icm6B8/kMpSTgpMRQjiuO85mEyNfqav9KuCW4eVQ9r+BW1sNTf6PmlT",
    "1JhpuIfJvBIPrt5lRiy4wJJLumS9+RGykm4QXrDFS5g5UFiM6jbtAdrgpG8vZhSfSutksHUuQCze",
    "JSfiN6APemmYDbpuIZQvhmo9vGles6BRXu+bDMT/qYfYa+ZdfmYXo9R4jVpWgeO1NKCWW/wqU+Ry",
    "hQxnvhqlkRPx9j4iA9CBUQ/e+oECgYEA7uusmgGgGhVps2waaxIjVFhVH7TBUauUPxb6pzkYrWve",
    "nb2XSl/LnJgXyNBjbHmkYP36+6Ovf8/5cA9J65rszr2Cg6RbqnVhwE4H0rrcyOtr2SFA620pusdV",
    "5l6/hNVcOFmM12/rYhkVuTFdiY0waMkd2CP/1NFhZYpTMPzFS3sCgYEA0gBrwzYzet1SJ1P2k9Xi",
    "6Q+LtmM2gVYEStr4WrTTMcoQRtmRxI6tpdAulp27ho9ODVbLSamAFnlqNqE1vWPTvlggnUX2sYVg",
    "6O4TMbbq3xDG6SB7k0jb4GjhMXDHuKed2b5auCAC+d2giGPikVhwwnuTtRFxXFLPHd4aa2IhwbUC",
    "gYEA6AuHOJBpkcvIPFW7FtCn9YxRKJkixRJyyg+kY/NlT1GcBfIUVUzS8YUaXJRgbAN8riMet3YT",
    "xnwUlEyVC7oNUwHmF7ryuIyG4wImQPnx40YbGehdKAp+5AQkHrlZI0ch6Sy4SKlPoJgibBpQ8X5q",
    "TOtADCNynpy5DqiZAdQOPq8CgYA4EBS00Mt9iYhdJ3U0km05ewT5dBMhBC2xLjQPQyb+q8scnwjj",
    "SJPjKGjHnORrT+auePVcfPvNBCzu2KrYHMZykmRimEL7sXflt2k4ZHTfiEMSCbHz6AeLKXS1Fj67",
    "dUQW1VKyxRkGS7yHrOLXmpy/zu3n8PgqhZD1kE3NTS1l4QKBgQC2jEU8kfB5RlP2tsnndchhpXtp",
    "z/ZkhlGRemfqboLwR9KB9i6nVW1tp/cHOs7fNYxhS1vIonRDU+JRYE7+0JklAsrVJ+RKJQfjrE27",
    "r4Qb9BDKLxqyMgR88cUjJevLMN/1WwhEiaETfybfOJHZCAWhC1YX+AH4iQl2CP1SGC55GA==",
);

/// Certificate name the fixtures are stored under in test trust stores.
pub const TEST_CERTIFICATE_NAME: &str = "signing-cert";

/// Certificate backed by [`PRIMARY_KEY_PKCS8_B64`].
///
/// # Panics
///
/// Panics if the fixture does not parse, which indicates a corrupted fixture.
#[must_use]
pub fn test_certificate() -> Certificate {
    Certificate::from_base64(PRIMARY_KEY_PKCS8_B64).expect("primary fixture key must parse")
}

/// Certificate backed by [`SECONDARY_KEY_PKCS1_B64`].
///
/// # Panics
///
/// Panics if the fixture does not parse.
#[must_use]
pub fn secondary_certificate() -> Certificate {
    Certificate::from_base64(SECONDARY_KEY_PKCS1_B64).expect("secondary fixture key must parse")
}

/// Primary private key paired with the secondary public key.
///
/// Signatures produced with it never verify against its own public key.
#[must_use]
pub fn mismatched_certificate() -> Certificate {
    test_certificate().with_public_key_der(secondary_certificate().public_key_der().to_vec())
}
