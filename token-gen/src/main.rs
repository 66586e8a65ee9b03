use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use clap::Parser;
use ed25519_dalek::{Signer, SigningKey, pkcs8::DecodePrivateKey};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Mint an EdDSA-signed access token for exercising bearer-gate locally.
///
/// - Header: alg=EdDSA, typ=JWT, kid
/// - Claims: iss, sub, iat, exp, jti, roles (plus aud / nbf when given)
/// - `--print-jwks` also prints the JWKS document to serve for the same key
#[derive(Parser, Debug)]
#[command(name = "token-gen", version, about)]
struct Args {
    /// Path to an Ed25519 private key in PEM (PKCS#8)
    #[arg(long, value_name = "FILE")]
    private_pem: PathBuf,

    /// Issuer (iss); must match AUTH_ISSUER exactly
    #[arg(long)]
    issuer: String,

    /// Subject (sub)
    #[arg(long, default_value = "alice")]
    sub: String,

    /// Comma separated roles, e.g. user,admin
    #[arg(long, default_value = "user")]
    roles: String,

    /// Key id placed in the header
    #[arg(long, default_value = "static")]
    kid: String,

    /// Lifetime in seconds
    #[arg(long, default_value_t = 300)]
    ttl: i64,

    /// Audience (aud)
    #[arg(long)]
    audience: Option<String>,

    /// Emit nbf = iat + offset (seconds, may be negative)
    #[arg(long, allow_hyphen_values = true)]
    nbf_offset: Option<i64>,

    /// Also print the JWKS document for this key
    #[arg(long, default_value_t = false)]
    print_jwks: bool,

    /// Print only the token
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn b64url_json(value: &Value) -> Result<String, serde_json::Error> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn build_claims(args: &Args, iat: i64, jti: &str) -> Result<Value, String> {
    let roles = args
        .roles
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>();

    let exp = iat
        .checked_add(args.ttl)
        .ok_or_else(|| format!("--ttl {} overflows the expiry time", args.ttl))?;

    let mut claims = Map::new();
    claims.insert("iss".to_string(), json!(args.issuer));
    claims.insert("sub".to_string(), json!(args.sub));
    claims.insert("iat".to_string(), json!(iat));
    claims.insert("exp".to_string(), json!(exp));
    claims.insert("jti".to_string(), json!(jti));
    claims.insert("roles".to_string(), json!(roles));

    if let Some(aud) = &args.audience {
        claims.insert("aud".to_string(), json!(aud));
    }
    if let Some(offset) = args.nbf_offset {
        let nbf = iat
            .checked_add(offset)
            .ok_or_else(|| format!("--nbf-offset {offset} overflows the not-before time"))?;
        claims.insert("nbf".to_string(), json!(nbf));
    }

    Ok(Value::Object(claims))
}

fn sign(signing_key: &SigningKey, header: &Value, claims: &Value) -> Result<String, serde_json::Error> {
    let signing_input = format!("{}.{}", b64url_json(header)?, b64url_json(claims)?);
    let sig = signing_key.sign(signing_input.as_bytes());
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(sig.to_bytes())))
}

fn jwks(signing_key: &SigningKey, kid: &str) -> Value {
    json!({
        "keys": [{
            "kty": "OKP",
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(signing_key.verifying_key().as_bytes()),
            "kid": kid,
            "alg": "EdDSA",
            "use": "sig",
        }]
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let pem = fs::read_to_string(&args.private_pem)?;
    let signing_key = SigningKey::from_pkcs8_pem(&pem)?;

    let iat = now_unix();
    let jti = Uuid::new_v4().to_string();

    let header = json!({ "alg": "EdDSA", "typ": "JWT", "kid": args.kid });
    let claims = build_claims(&args, iat, &jti)?;
    let token = sign(&signing_key, &header, &claims)?;

    if args.quiet {
        println!("{}", token);
        return Ok(());
    }

    println!("token: {}", token);
    println!("kid: {}", args.kid);
    println!("exp: {}", claims["exp"]);
    println!("jti: {}", jti);
    if args.print_jwks {
        println!("jwks: {}", serde_json::to_string_pretty(&jwks(&signing_key, &args.kid))?);
    }

    Ok(())
}
