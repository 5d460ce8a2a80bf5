//! Builder objects: stage a definition, resources and ingredients, then sign.

use std::collections::BTreeMap;
use std::ffi::c_char;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::alloc::alloc_bytes;
use crate::container::{self, EmbeddedManifest};
use crate::engine::{arg, supports, BUILDER_MIME_TYPES};
use crate::signer::FakeSigner;
use crate::spy;
use crate::stream::{stream_mut, FakeStream};

const ARCHIVE_MAGIC: &[u8; 8] = b"C2PAARCH";

const INGREDIENT_LABEL: &str = "c2pa.ingredient.v3";

/// Everything a builder holds; also the archive body.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FakeBuilder {
    definition: Map<String, Value>,
    no_embed: bool,
    remote_url: Option<String>,
    /// Hex-encoded resource data by URI.
    resources: BTreeMap<String, String>,
    ingredients: Vec<Value>,
}

impl FakeBuilder {
    fn from_definition(json: &str) -> Result<Self, (&'static str, String)> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(definition)) => Ok(Self {
                definition,
                ..Self::default()
            }),
            Ok(_) => Err(("Json", "manifest definition must be a JSON object".into())),
            Err(e) => Err(("Json", e.to_string())),
        }
    }

    fn next_ingredient_label(&self) -> String {
        match self.ingredients.len() {
            0 => INGREDIENT_LABEL.to_string(),
            n => format!("{INGREDIENT_LABEL}__{n}"),
        }
    }

    fn add_ingredient(&mut self, json: &str, format: &str, asset: &[u8]) -> Result<(), (&'static str, String)> {
        let mut ingredient = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(("Json", "ingredient must be a JSON object".into())),
            Err(e) => return Err(("Json", e.to_string())),
        };
        ingredient.insert("format".into(), json!(format));
        ingredient.insert("label".into(), json!(self.next_ingredient_label()));
        ingredient
            .entry("instance_id")
            .or_insert_with(|| json!(format!("xmp:iid:{}", uuid::Uuid::new_v4())));
        ingredient
            .entry("relationship")
            .or_insert_with(|| json!("componentOf"));
        ingredient.insert("hash".into(), json!(container::asset_hash(container::strip(asset))));
        self.ingredients.push(Value::Object(ingredient));
        Ok(())
    }

    /// Produce the manifest for `asset` and the bytes to write to the destination.
    fn sign(
        &self,
        format: &str,
        asset: &[u8],
        signer: &FakeSigner,
    ) -> Result<(Vec<u8>, Vec<u8>), (&'static str, String)> {
        let label = format!("urn:uuid:{}", uuid::Uuid::new_v4());

        let mut manifest = self.definition.clone();
        manifest.insert("label".into(), json!(label));
        manifest.insert("format".into(), json!(format));
        manifest.insert(
            "instance_id".into(),
            json!(format!("xmp:iid:{}", uuid::Uuid::new_v4())),
        );
        let mut ingredients = match manifest.remove("ingredients") {
            Some(Value::Array(declared)) => declared,
            _ => Vec::new(),
        };
        ingredients.extend(self.ingredients.iter().cloned());
        manifest.insert("ingredients".into(), Value::Array(ingredients));

        let claim = serde_json::to_vec(&manifest).map_err(|e| ("Json", e.to_string()))?;
        let signature = signer.sign(&claim)?;

        manifest.insert(
            "signature_info".into(),
            json!({ "alg": signer.alg(), "issuer": "C2PA Bridge Test" }),
        );
        if let Some(url) = &signer.ta_url {
            manifest.insert("timestamp_authority".into(), json!(url));
        }

        let asset = container::strip(asset);
        let embedded = EmbeddedManifest {
            store: json!({
                "active_manifest": label,
                "manifests": { label.clone(): manifest },
            }),
            asset_hash: container::asset_hash(asset),
            signature: hex::encode(signature),
            resources: self.resources.clone(),
            remote_url: self.remote_url.clone(),
        };
        let manifest_bytes = serde_json::to_vec(&embedded).map_err(|e| ("Json", e.to_string()))?;

        let output = if self.no_embed {
            asset.to_vec()
        } else {
            container::embed(asset, &manifest_bytes).map_err(|e| ("Manifest", e))?
        };
        Ok((manifest_bytes, output))
    }
}

fn fail<T>(err: (&'static str, String), sentinel: T) -> T {
    spy::set_error(err.0, err.1);
    sentinel
}

unsafe fn read_stream(stream: *mut FakeStream) -> Result<Vec<u8>, (&'static str, String)> {
    let stream = stream_mut(stream).ok_or(("Other", "stream is null".to_string()))?;
    stream.read_to_end().map_err(|e| ("Io", e))
}

pub unsafe extern "C" fn c2pa_builder_from_json(json: *const c_char) -> *mut FakeBuilder {
    spy::record("c2pa_builder_from_json");
    let Some(json) = arg(json, "manifest JSON") else {
        return std::ptr::null_mut();
    };
    match FakeBuilder::from_definition(json) {
        Ok(builder) => Box::into_raw(Box::new(builder)),
        Err(e) => fail(e, std::ptr::null_mut()),
    }
}

pub unsafe extern "C" fn c2pa_builder_from_archive(stream: *mut FakeStream) -> *mut FakeBuilder {
    spy::record("c2pa_builder_from_archive");
    let data = match read_stream(stream) {
        Ok(data) => data,
        Err(e) => return fail(e, std::ptr::null_mut()),
    };
    let Some(body) = data.strip_prefix(ARCHIVE_MAGIC.as_slice()) else {
        return fail(("Decoding", "not a builder archive".into()), std::ptr::null_mut());
    };
    match serde_json::from_slice::<FakeBuilder>(body) {
        Ok(builder) => Box::into_raw(Box::new(builder)),
        Err(e) => fail(("Decoding", format!("corrupt archive: {e}")), std::ptr::null_mut()),
    }
}

pub unsafe extern "C" fn c2pa_builder_free(builder: *mut FakeBuilder) {
    spy::record("c2pa_builder_free");
    if !builder.is_null() {
        drop(Box::from_raw(builder));
    }
}

pub unsafe extern "C" fn c2pa_builder_set_no_embed(builder: *mut FakeBuilder) {
    spy::record("c2pa_builder_set_no_embed");
    if let Some(builder) = builder.as_mut() {
        builder.no_embed = true;
    }
}

pub unsafe extern "C" fn c2pa_builder_set_remote_url(builder: *mut FakeBuilder, url: *const c_char) -> i32 {
    spy::record("c2pa_builder_set_remote_url");
    let (Some(builder), Some(url)) = (builder.as_mut(), arg(url, "remote URL")) else {
        return -1;
    };
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return fail(("RemoteManifest", format!("invalid remote URL: {url:?}")), -1);
    }
    builder.remote_url = Some(url.to_string());
    0
}

pub unsafe extern "C" fn c2pa_builder_add_resource(
    builder: *mut FakeBuilder,
    uri: *const c_char,
    stream: *mut FakeStream,
) -> i32 {
    spy::record("c2pa_builder_add_resource");
    let (Some(builder), Some(uri)) = (builder.as_mut(), arg(uri, "resource URI")) else {
        return -1;
    };
    match read_stream(stream) {
        Ok(data) => {
            builder.resources.insert(uri.to_string(), hex::encode(data));
            0
        }
        Err(e) => fail(e, -1),
    }
}

pub unsafe extern "C" fn c2pa_builder_add_ingredient_from_stream(
    builder: *mut FakeBuilder,
    json: *const c_char,
    format: *const c_char,
    stream: *mut FakeStream,
) -> i32 {
    spy::record("c2pa_builder_add_ingredient_from_stream");
    let (Some(builder), Some(json), Some(format)) = (
        builder.as_mut(),
        arg(json, "ingredient JSON"),
        arg(format, "format"),
    ) else {
        return -1;
    };
    let result = read_stream(stream).and_then(|asset| builder.add_ingredient(json, format, &asset));
    match result {
        Ok(()) => 0,
        Err(e) => fail(e, -1),
    }
}

pub unsafe extern "C" fn c2pa_builder_to_archive(builder: *mut FakeBuilder, stream: *mut FakeStream) -> i32 {
    spy::record("c2pa_builder_to_archive");
    let (Some(builder), Some(stream)) = (builder.as_ref(), stream_mut(stream)) else {
        return fail(("Other", "null argument".into()), -1);
    };
    let mut archive = ARCHIVE_MAGIC.to_vec();
    if let Err(e) = serde_json::to_writer(&mut archive, builder) {
        return fail(("Json", e.to_string()), -1);
    }
    match stream.rewrite(&archive) {
        Ok(()) => 0,
        Err(e) => fail(("Io", e), -1),
    }
}

pub unsafe extern "C" fn c2pa_builder_sign(
    builder: *mut FakeBuilder,
    format: *const c_char,
    source: *mut FakeStream,
    dest: *mut FakeStream,
    signer: *mut FakeSigner,
    manifest_bytes: *mut *const u8,
) -> i64 {
    spy::record("c2pa_builder_sign");
    let (Some(builder), Some(signer), Some(dest)) = (builder.as_ref(), signer.as_ref(), stream_mut(dest))
    else {
        return fail(("Other", "null argument".into()), -1);
    };
    let Some(format) = arg(format, "format") else {
        return -1;
    };
    if !supports(BUILDER_MIME_TYPES, format) {
        return fail(("NotSupported", format!("type is unsupported: {format}")), -1);
    }

    let asset = match read_stream(source) {
        Ok(asset) => asset,
        Err(e) => return fail(e, -1),
    };
    let (manifest, output) = match builder.sign(format, &asset, signer) {
        Ok(signed) => signed,
        Err(e) => return fail(e, -1),
    };

    if let Err(e) = dest.rewrite(&output) {
        return fail(("Io", e), -1);
    }
    // Read back what was written, as verify-after-sign would.
    match dest.read_to_end() {
        Ok(written) if written.starts_with(&output) => {}
        Ok(_) => return fail(("Verify", "signed output did not round trip".into()), -1),
        Err(e) => return fail(("Io", e), -1),
    }

    if !manifest_bytes.is_null() {
        *manifest_bytes = alloc_bytes(&manifest);
    }
    manifest.len() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingredient_labels_are_numbered() {
        let mut builder = FakeBuilder::from_definition("{}").unwrap();
        for _ in 0..3 {
            builder.add_ingredient(r#"{"title": "a"}"#, "image/jpeg", b"x").unwrap();
        }
        let labels: Vec<_> = builder
            .ingredients
            .iter()
            .map(|i| i["label"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            labels,
            ["c2pa.ingredient.v3", "c2pa.ingredient.v3__1", "c2pa.ingredient.v3__2"]
        );
    }

    #[test]
    fn test_definition_must_be_object() {
        assert_eq!(FakeBuilder::from_definition("[1]").unwrap_err().0, "Json");
        assert_eq!(FakeBuilder::from_definition("{ nope").unwrap_err().0, "Json");
    }
}
