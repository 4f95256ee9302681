use super::*;
use bytes::Bytes;
use std::collections::BTreeMap;

#[test]
fn test_decode_integer() {
    assert_eq!(decode(b"i42e").unwrap().as_int(), Some(42));
    assert_eq!(decode(b"i-7e").unwrap().as_int(), Some(-7));
    assert_eq!(decode(b"i0e").unwrap().as_int(), Some(0));
}

#[test]
fn test_decode_integer_rejects_leading_zero() {
    assert!(decode(b"i007e").is_err());
    assert!(decode(b"i-0e").is_err());
    assert!(decode(b"ie").is_err());
}

#[test]
fn test_decode_bytes() {
    let v = decode(b"4:spam").unwrap();
    assert_eq!(v.as_bytes().map(|b| b.as_ref()), Some(b"spam".as_slice()));

    let empty = decode(b"0:").unwrap();
    assert_eq!(empty.as_bytes().map(|b| b.len()), Some(0));
}

#[test]
fn test_decode_bytes_truncated() {
    assert!(matches!(decode(b"10:short"), Err(BencodeError::Truncated)));
    assert!(matches!(decode(b"4spam"), Err(BencodeError::Truncated)));
}

#[test]
fn test_decode_list() {
    let v = decode(b"li1ei2e3:abce").unwrap();
    let items = v.as_list().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_int(), Some(1));
    assert_eq!(items[2].as_str(), Some("abc"));
}

#[test]
fn test_decode_dict() {
    let v = decode(b"d3:agei30e4:name5:Alicee").unwrap();
    assert_eq!(v.get(b"age").and_then(|v| v.as_int()), Some(30));
    assert_eq!(v.get(b"name").and_then(|v| v.as_str()), Some("Alice"));
    assert_eq!(v.get(b"missing"), None);
}

#[test]
fn test_decode_dict_rejects_non_string_key() {
    assert!(decode(b"di1e3:vale").is_err());
}

#[test]
fn test_decode_trailing_data() {
    assert!(matches!(decode(b"i1eX"), Err(BencodeError::TrailingData)));
}

#[test]
fn test_decode_depth_limit() {
    let mut deep = Vec::new();
    deep.extend(std::iter::repeat(b'l').take(100));
    deep.extend(std::iter::repeat(b'e').take(100));
    assert!(matches!(decode(&deep), Err(BencodeError::TooDeep)));
}

#[test]
fn test_encode_round_trip() {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"t"), Value::string("aa"));
    dict.insert(Bytes::from_static(b"y"), Value::string("q"));
    dict.insert(
        Bytes::from_static(b"list"),
        Value::List(vec![Value::Integer(-3), Value::bytes(b"\x00\xff")]),
    );
    let original = Value::Dict(dict);

    let encoded = encode(&original).unwrap();
    let decoded = decode(&encoded).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_encode_sorts_dict_keys() {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"zz"), Value::Integer(1));
    dict.insert(Bytes::from_static(b"aa"), Value::Integer(2));

    let encoded = encode(&Value::Dict(dict)).unwrap();
    assert_eq!(encoded, b"d2:aai2e2:zzi1ee");
}

#[test]
fn test_krpc_shaped_message() {
    // The exact frame a ping query travels as on the wire.
    let raw = b"d1:ad2:id20:abcdefghij0123456789e1:q4:ping1:t2:aa1:y1:qe";
    let v = decode(raw).unwrap();

    assert_eq!(v.get(b"y").and_then(|v| v.as_str()), Some("q"));
    assert_eq!(v.get(b"q").and_then(|v| v.as_str()), Some("ping"));
    let id = v
        .get(b"a")
        .and_then(|a| a.get(b"id"))
        .and_then(|v| v.as_bytes())
        .unwrap();
    assert_eq!(id.len(), 20);

    assert_eq!(encode(&v).unwrap(), raw.to_vec());
}
