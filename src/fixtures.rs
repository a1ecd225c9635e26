#[cfg(test)]
pub mod test {
    use serde::Serialize;

    use crate::Record;
    use crate::optional::Optional;

    #[derive(Record, Serialize, Default, Debug, Clone, PartialEq)]
    pub struct App {
        #[env("optional")]
        pub name: String,

        #[env(flatten)]
        #[serde(flatten)]
        pub server: Server,

        #[env("prefix=DB")]
        #[serde(rename = "db")]
        pub database: Database,
    }

    #[derive(Record, Serialize, Default, Debug, Clone, PartialEq)]
    pub struct Server {
        pub host: String,

        #[env("default=8080")]
        pub port: u16,

        #[env("prefix=TLS")]
        pub tls: Option<Tls>,
    }

    #[derive(Record, Serialize, Default, Debug, Clone, PartialEq)]
    pub struct Tls {
        #[env("optional")]
        pub cert: String,
    }

    #[derive(Record, Serialize, Default, Debug, Clone, PartialEq)]
    pub struct Database {
        pub url: String,

        #[env("default=5")]
        pub pool_size: usize,

        pub timeout: Optional<u32>,
    }

    #[test]
    fn app_loads_from_its_own_serialization() {
        let original = App {
            name: "demo".into(),
            server: Server {
                host: "example.org".into(),
                port: 443,
                tls: Some(Tls {
                    cert: "/etc/tls/cert.pem".into(),
                }),
            },
            database: Database {
                url: "postgres://db/app".into(),
                pool_size: 10,
                timeout: Optional::Set(15),
            },
        };
        let source = crate::MapSource::from_serialize(&original, "_").unwrap();
        let loaded: App = crate::Cfgenv::builder().source(source).load().unwrap();
        assert_eq!(loaded, original);
    }
}
