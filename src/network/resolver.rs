use log::debug;
use std::collections::HashMap;
use std::net::IpAddr;

pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// IPアドレスからホスト名を引く
pub trait HostResolver: Send {
    fn lookup(&mut self, addr: IpAddr) -> Vec<String>;
}

/// 名前解決を行わず、アドレスの文字列表現をそのまま返す
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralResolver;

impl HostResolver for LiteralResolver {
    fn lookup(&mut self, addr: IpAddr) -> Vec<String> {
        vec![addr.to_string()]
    }
}

/// 逆引きDNSをキャッシュ付きで行う
///
/// 解決できなかったアドレスは文字列表現を返し、その結果もキャッシュする。
/// キャッシュが上限に達したら全て破棄する。
pub struct DnsResolver<F = fn(&IpAddr) -> std::io::Result<String>> {
    reverse_lookup: F,
    cache: HashMap<IpAddr, Vec<String>>,
    capacity: usize,
}

impl DnsResolver {
    pub fn new() -> Self {
        Self::with_lookup(dns_lookup::lookup_addr, DEFAULT_CACHE_CAPACITY)
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> DnsResolver<F>
where
    F: FnMut(&IpAddr) -> std::io::Result<String>,
{
    pub fn with_lookup(reverse_lookup: F, capacity: usize) -> Self {
        Self {
            reverse_lookup,
            cache: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    #[cfg(test)]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<F> HostResolver for DnsResolver<F>
where
    F: FnMut(&IpAddr) -> std::io::Result<String> + Send,
{
    fn lookup(&mut self, addr: IpAddr) -> Vec<String> {
        if let Some(hosts) = self.cache.get(&addr) {
            return hosts.clone();
        }

        let hosts = match (self.reverse_lookup)(&addr) {
            Ok(name) if !name.is_empty() => vec![name],
            Ok(_) => vec![addr.to_string()],
            Err(e) => {
                debug!("逆引きに失敗しました {}: {}", addr, e);
                vec![addr.to_string()]
            }
        };

        if self.cache.len() >= self.capacity {
            self.cache.clear();
        }
        self.cache.insert(addr, hosts.clone());
        hosts
    }
}
