use std::collections::HashMap;
use std::fmt;

/// Fully-qualified name of the interop test service.
pub const SERVICE_NAME: &str = "grpc.testing.TestService";

/// The methods of `grpc.testing.TestService` this server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestMethod {
    EmptyCall,
    UnaryCall,
    StreamingOutputCall,
    StreamingInputCall,
    FullDuplexCall,
    /// Registered so clients get a well-formed `UNIMPLEMENTED`.
    HalfDuplexCall,
}

impl TestMethod {
    pub const ALL: [TestMethod; 6] = [
        TestMethod::EmptyCall,
        TestMethod::UnaryCall,
        TestMethod::StreamingOutputCall,
        TestMethod::StreamingInputCall,
        TestMethod::FullDuplexCall,
        TestMethod::HalfDuplexCall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TestMethod::EmptyCall => "EmptyCall",
            TestMethod::UnaryCall => "UnaryCall",
            TestMethod::StreamingOutputCall => "StreamingOutputCall",
            TestMethod::StreamingInputCall => "StreamingInputCall",
            TestMethod::FullDuplexCall => "FullDuplexCall",
            TestMethod::HalfDuplexCall => "HalfDuplexCall",
        }
    }

    /// Method path as it appears in the HTTP/2 `:path` header.
    pub fn path(self) -> &'static str {
        match self {
            TestMethod::EmptyCall => "/grpc.testing.TestService/EmptyCall",
            TestMethod::UnaryCall => "/grpc.testing.TestService/UnaryCall",
            TestMethod::StreamingOutputCall => "/grpc.testing.TestService/StreamingOutputCall",
            TestMethod::StreamingInputCall => "/grpc.testing.TestService/StreamingInputCall",
            TestMethod::FullDuplexCall => "/grpc.testing.TestService/FullDuplexCall",
            TestMethod::HalfDuplexCall => "/grpc.testing.TestService/HalfDuplexCall",
        }
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Router maps method paths ("/pkg.Service/Method") to the method they invoke.
///
/// Built once at startup and never modified afterwards.
#[derive(Debug, Clone)]
pub struct Router {
    methods: HashMap<&'static str, TestMethod>,
}

impl Router {
    /// Table holding every `TestService` method.
    #[must_use]
    pub fn interop() -> Self {
        let methods = TestMethod::ALL
            .into_iter()
            .map(|method| (method.path(), method))
            .collect();
        Self { methods }
    }

    pub fn resolve(&self, path: &str) -> Option<TestMethod> {
        self.methods.get(path).copied()
    }

    /// Registered method paths, sorted.
    pub fn list_methods(&self) -> Vec<String> {
        let mut v: Vec<String> = self.methods.keys().map(|path| path.to_string()).collect();
        v.sort();
        v
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::interop()
    }
}
