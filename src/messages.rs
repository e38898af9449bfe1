// Finding text catalog
//
// Templates are keyed by `<technique prefix><vulnerability key>`, e.g.
// "header.nonealgorithm". A technique reusing a vulnerability type under its
// own prefix gets its own wording (payload vs signature null byte).

use lazy_static::lazy_static;
use std::collections::HashMap;

pub const HEADER_PREFIX: &str = "header.";
pub const PAYLOAD_PREFIX: &str = "payload.";
pub const SIGNATURE_PREFIX: &str = "signature.";
pub const MISC_PREFIX: &str = "misc.";
pub const SECRET_PREFIX: &str = "secret.";
pub const CLIENT_PREFIX: &str = "client.";
pub const FUZZER_PREFIX: &str = "fuzzer.";

#[derive(Debug, Clone, Copy)]
pub struct MessageTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub solution: &'static str,
    pub reference: &'static str,
    pub cwe_id: u32,
    pub wasc_id: u32,
}

const FALLBACK: MessageTemplate = MessageTemplate {
    name: "JWT Vulnerability",
    description: "The target accepted a manipulated JSON Web Token.",
    solution: "Validate JWT signatures with a trusted key and a fixed algorithm allow-list.",
    reference: "https://datatracker.ietf.org/doc/html/rfc8725",
    cwe_id: 347,
    wasc_id: 15,
};

lazy_static! {
    static ref CATALOG: HashMap<&'static str, MessageTemplate> = {
        let mut m = HashMap::new();
        m.insert("header.nonealgorithm", MessageTemplate {
            name: "JWT None Algorithm Accepted",
            description: "The target accepted an unsigned token whose header declares the \"none\" algorithm (or a case variant of it).",
            solution: "Reject tokens declaring \"none\" in any capitalization and pin the expected algorithm during verification.",
            reference: "https://cve.mitre.org/cgi-bin/cvename.cgi?name=CVE-2015-9235",
            cwe_id: 347,
            wasc_id: 15,
        });
        m.insert("payload.nullbyte", MessageTemplate {
            name: "JWT Null Byte Injection Accepted",
            description: "The target accepted a token carrying a null byte followed by extra data, either after the signature or inside a payload claim, without failing signature validation.",
            solution: "Validate the full token string and the complete claim values; never truncate input at null bytes.",
            reference: "https://owasp.org/www-community/attacks/Embedding_Null_Code",
            cwe_id: 158,
            wasc_id: 28,
        });
        m.insert("signature.nullbyte", MessageTemplate {
            name: "JWT Null Byte Signature Bypass",
            description: "The target accepted a token whose signature was replaced by, or extended with, a null byte sequence.",
            solution: "Compare the complete decoded signature in constant time and reject any trailing data.",
            reference: "https://owasp.org/www-community/attacks/Embedding_Null_Code",
            cwe_id: 347,
            wasc_id: 15,
        });
        m.insert("signature.customprivatekey", MessageTemplate {
            name: "JWT Embedded Key Trusted (JWK Header Injection)",
            description: "The target accepted a token signed with a freshly generated private key whose public half was embedded in the token's \"jwk\" header.",
            solution: "Never verify a token with key material taken from the token itself; only use pre-configured trusted keys.",
            reference: "https://nvd.nist.gov/vuln/detail/CVE-2018-0114",
            cwe_id: 347,
            wasc_id: 15,
        });
        m.insert("signature.algorithmconfusion", MessageTemplate {
            name: "JWT Algorithm Confusion",
            description: "The target accepted an HMAC-signed token whose secret was the server's RSA public key, so anyone holding the public key can mint tokens.",
            solution: "Bind each verification key to exactly one algorithm and reject tokens whose header algorithm differs.",
            reference: "https://auth0.com/blog/critical-vulnerabilities-in-json-web-token-libraries/",
            cwe_id: 327,
            wasc_id: 15,
        });
        m.insert("misc.emptytokens", MessageTemplate {
            name: "JWT Empty Token Accepted",
            description: "The target treated a degenerate token with empty header, payload and signature as authenticated.",
            solution: "Reject structurally invalid tokens before any authorization decision.",
            reference: "https://datatracker.ietf.org/doc/html/rfc7519#section-7.2",
            cwe_id: 287,
            wasc_id: 1,
        });
        m.insert("secret.bruteforce", MessageTemplate {
            name: "JWT Weak HMAC Secret",
            description: "The HMAC secret protecting the token was recovered by dictionary or brute-force search, allowing arbitrary tokens to be forged.",
            solution: "Use a randomly generated secret of at least the hash output length and rotate the exposed secret.",
            reference: "https://datatracker.ietf.org/doc/html/rfc8725#section-3.5",
            cwe_id: 521,
            wasc_id: 11,
        });
        m.insert("fuzzer.customfield", MessageTemplate {
            name: "JWT Custom Field Value Accepted",
            description: "The target accepted a token in which a configured header or payload field was replaced with a value from the operator's wordlist.",
            solution: "Validate every security-relevant header parameter and claim against an allow-list after verifying the signature with a trusted key.",
            reference: "https://datatracker.ietf.org/doc/html/rfc8725#section-3.10",
            cwe_id: 20,
            wasc_id: 15,
        });
        m.insert("client.nohttponly", MessageTemplate {
            name: "JWT Cookie Without HttpOnly",
            description: "The token is stored in a cookie lacking the HttpOnly attribute and can be read by injected scripts.",
            solution: "Set the HttpOnly attribute on cookies carrying tokens.",
            reference: "https://owasp.org/www-community/HttpOnly",
            cwe_id: 1004,
            wasc_id: 13,
        });
        m.insert("client.nosecure", MessageTemplate {
            name: "JWT Cookie Without Secure Flag",
            description: "The token is stored in a cookie lacking the Secure attribute and may be sent over plain HTTP.",
            solution: "Set the Secure attribute on cookies carrying tokens.",
            reference: "https://owasp.org/www-project-web-security-testing-guide/",
            cwe_id: 614,
            wasc_id: 13,
        });
        m.insert("client.nosamesite", MessageTemplate {
            name: "JWT Cookie Without SameSite",
            description: "The token is stored in a cookie lacking the SameSite attribute and is attached to cross-site requests.",
            solution: "Set SameSite=Strict or SameSite=Lax on cookies carrying tokens.",
            reference: "https://owasp.org/www-community/SameSite",
            cwe_id: 1275,
            wasc_id: 13,
        });
        m.insert("client.urlexposure", MessageTemplate {
            name: "JWT Exposed In URL",
            description: "The token is sent as a URL query parameter and ends up in logs, history and Referer headers.",
            solution: "Send tokens in the Authorization header or a protected cookie instead of the URL.",
            reference: "https://cwe.mitre.org/data/definitions/598.html",
            cwe_id: 598,
            wasc_id: 13,
        });
        m
    };
}

pub fn lookup(prefix: &str, key: &str) -> MessageTemplate {
    let full = format!("{}{}", prefix, key);
    CATALOG.get(full.as_str()).copied().unwrap_or(FALLBACK)
}
