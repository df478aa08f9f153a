//! 门户 DNS：把所有 A 查询都解析到热点地址

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use crate::boards::DnsService;

const DNS_HEADER_LEN: usize = 12;
const DNS_RESPONSE_TTL: u32 = 60;
const QTYPE_A: u16 = 1;
const QTYPE_ANY: u16 = 255;
const QCLASS_IN: u16 = 1;

#[derive(Debug, PartialEq, Eq)]
struct DnsQuestion {
    /// 问题段长度（QNAME + QTYPE + QCLASS）
    len: usize,
    qtype: u16,
    name: String,
}

fn parse_question(packet: &[u8]) -> Option<DnsQuestion> {
    if packet.len() < DNS_HEADER_LEN {
        return None;
    }
    // 只处理标准查询（QR=0, OPCODE=0）
    if packet[2] & 0xF8 != 0 {
        return None;
    }
    if u16::from_be_bytes([packet[4], packet[5]]) == 0 {
        return None;
    }

    let mut idx = DNS_HEADER_LEN;
    let mut name = String::new();
    loop {
        let label_len = *packet.get(idx)? as usize;
        idx += 1;
        if label_len == 0 {
            break;
        }
        // 问题段不应出现压缩指针
        if label_len & 0xC0 != 0 || idx + label_len > packet.len() {
            return None;
        }
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(&String::from_utf8_lossy(&packet[idx..idx + label_len]));
        idx += label_len;
    }

    if idx + 4 > packet.len() {
        return None;
    }
    let qtype = u16::from_be_bytes([packet[idx], packet[idx + 1]]);
    idx += 4;

    Some(DnsQuestion {
        len: idx - DNS_HEADER_LEN,
        qtype,
        name,
    })
}

/// 构造只回答第一个问题的响应
fn build_response(query: &[u8], question: &DnsQuestion, answer: Ipv4Addr) -> Vec<u8> {
    let question_end = DNS_HEADER_LEN + question.len;
    let answers: u16 = if matches!(question.qtype, QTYPE_A | QTYPE_ANY) {
        1
    } else {
        0
    };

    let mut resp = Vec::with_capacity(question_end + 16);
    resp.extend_from_slice(&query[0..2]);
    // QR=1, AA=1, 保留 RD；RA=1, RCODE=0
    resp.push(0x84 | (query[2] & 0x01));
    resp.push(0x80);
    resp.extend_from_slice(&1u16.to_be_bytes());
    resp.extend_from_slice(&answers.to_be_bytes());
    resp.extend_from_slice(&[0, 0, 0, 0]);
    resp.extend_from_slice(&query[DNS_HEADER_LEN..question_end]);

    if answers == 1 {
        resp.extend_from_slice(&[0xC0, 0x0C]); // pointer to question name
        resp.extend_from_slice(&QTYPE_A.to_be_bytes());
        resp.extend_from_slice(&QCLASS_IN.to_be_bytes());
        resp.extend_from_slice(&DNS_RESPONSE_TTL.to_be_bytes());
        resp.extend_from_slice(&4u16.to_be_bytes());
        resp.extend_from_slice(&answer.octets());
    }
    resp
}

/// UDP DNS 应答器（非阻塞）
pub struct CaptiveDns {
    socket: UdpSocket,
    answer: Ipv4Addr,
}

impl CaptiveDns {
    pub fn bind(addr: SocketAddr, answer: Ipv4Addr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        log::info!("[DNS] responding to every query with {} on {}", answer, addr);
        Ok(Self { socket, answer })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl DnsService for CaptiveDns {
    fn poll(&mut self) -> anyhow::Result<bool> {
        let mut frame = [0u8; 512];
        let (len, peer) = match self.socket.recv_from(&mut frame) {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let query = &frame[..len];
        let Some(question) = parse_question(query) else {
            log::debug!("[DNS] ignoring malformed query from {}", peer);
            return Ok(true);
        };

        let resp = build_response(query, &question, self.answer);
        if let Err(e) = self.socket.send_to(&resp, peer) {
            log::warn!("[DNS] send error: {:?}", e);
        } else {
            log::debug!("[DNS] {} -> {} (qtype {})", question.name, self.answer, question.qtype);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(name: &str, qtype: u16) -> Vec<u8> {
        let mut q = vec![0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
        for label in name.split('.') {
            q.push(label.len() as u8);
            q.extend_from_slice(label.as_bytes());
        }
        q.push(0);
        q.extend_from_slice(&qtype.to_be_bytes());
        q.extend_from_slice(&QCLASS_IN.to_be_bytes());
        q
    }

    #[test]
    fn parses_question() {
        let q = query("connectivitycheck.gstatic.com", QTYPE_A);
        let question = parse_question(&q).unwrap();
        assert_eq!(question.name, "connectivitycheck.gstatic.com");
        assert_eq!(question.qtype, QTYPE_A);
        assert_eq!(question.len, q.len() - DNS_HEADER_LEN);
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_question(&[0u8; 4]), None);
        let mut q = query("example.com", QTYPE_A);
        q.truncate(q.len() - 2);
        assert_eq!(parse_question(&q), None);
        // 响应包不处理
        let mut q = query("example.com", QTYPE_A);
        q[2] |= 0x80;
        assert_eq!(parse_question(&q), None);
    }

    #[test]
    fn answers_a_record_with_ap_address() {
        let q = query("example.com", QTYPE_A);
        let question = parse_question(&q).unwrap();
        let r = build_response(&q, &question, Ipv4Addr::new(192, 168, 1, 1));

        assert_eq!(&r[0..2], &[0x12, 0x34]);
        assert_eq!(r[2] & 0x80, 0x80);
        assert_eq!(&r[6..8], &[0, 1]);
        assert_eq!(&r[r.len() - 4..], &[192, 168, 1, 1]);
    }

    #[test]
    fn other_types_get_empty_answer() {
        let q = query("example.com", 28);
        let question = parse_question(&q).unwrap();
        let r = build_response(&q, &question, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(&r[6..8], &[0, 0]);
        assert_eq!(r.len(), q.len());
    }

    #[test]
    fn serves_one_query_per_poll() {
        let mut dns = CaptiveDns::bind(
            "127.0.0.1:0".parse().unwrap(),
            Ipv4Addr::new(192, 168, 1, 1),
        )
        .unwrap();
        assert!(!dns.poll().unwrap());

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        client
            .send_to(&query("example.com", QTYPE_A), dns.local_addr().unwrap())
            .unwrap();

        let mut served = false;
        for _ in 0..200 {
            if dns.poll().unwrap() {
                served = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(served);

        let mut buf = [0u8; 512];
        let (n, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[n - 4..n], &[192, 168, 1, 1]);
    }
}
