// Python standard library module names and import-to-package aliases

/// Top-level modules shipped with CPython 3.8 - 3.13.
pub const STDLIB_MODULES: &[&str] = &[
    "__future__", "_thread", "abc", "aifc", "argparse", "array", "ast", "asynchat",
    "asyncio", "asyncore", "atexit", "audioop", "base64", "bdb", "binascii", "bisect",
    "builtins", "bz2", "calendar", "cgi", "cgitb", "chunk", "cmath", "cmd", "code",
    "codecs", "codeop", "collections", "colorsys", "compileall", "concurrent",
    "configparser", "contextlib", "contextvars", "copy", "copyreg", "cProfile", "crypt",
    "csv", "ctypes", "curses", "dataclasses", "datetime", "dbm", "decimal", "difflib",
    "dis", "distutils", "doctest", "email", "encodings", "ensurepip", "enum", "errno",
    "faulthandler", "fcntl", "filecmp", "fileinput", "fnmatch", "fractions", "ftplib",
    "functools", "gc", "getopt", "getpass", "gettext", "glob", "graphlib", "grp", "gzip",
    "hashlib", "heapq", "hmac", "html", "http", "idlelib", "imaplib", "imghdr", "imp",
    "importlib", "inspect", "io", "ipaddress", "itertools", "json", "keyword", "lib2to3",
    "linecache", "locale", "logging", "lzma", "mailbox", "mailcap", "marshal", "math",
    "mimetypes", "mmap", "modulefinder", "msilib", "msvcrt", "multiprocessing", "netrc",
    "nis", "nntplib", "ntpath", "numbers", "opcode", "operator", "optparse", "os",
    "ossaudiodev", "pathlib", "pdb", "pickle", "pickletools", "pipes", "pkgutil",
    "platform", "plistlib", "poplib", "posix", "posixpath", "pprint", "profile", "pstats",
    "pty", "pwd", "py_compile", "pyclbr", "pydoc", "queue", "quopri", "random", "re",
    "readline", "reprlib", "resource", "rlcompleter", "runpy", "sched", "secrets",
    "select", "selectors", "shelve", "shlex", "shutil", "signal", "site", "smtpd",
    "smtplib", "sndhdr", "socket", "socketserver", "spwd", "sqlite3", "sre_compile",
    "sre_constants", "sre_parse", "ssl", "stat", "statistics", "string", "stringprep",
    "struct", "subprocess", "sunau", "symtable", "sys", "sysconfig", "syslog", "tabnanny",
    "tarfile", "telnetlib", "tempfile", "termios", "textwrap", "threading", "time",
    "timeit", "tkinter", "token", "tokenize", "tomllib", "trace", "traceback",
    "tracemalloc", "tty", "turtle", "turtledemo", "types", "typing", "unicodedata",
    "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave", "weakref",
    "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib", "xml", "xmlrpc", "zipapp",
    "zipfile", "zipimport", "zlib", "zoneinfo",
];

/// Import names whose installable distribution is named differently.
pub const PACKAGE_ALIASES: &[(&str, &str)] = &[
    ("PIL", "pillow"),
    ("cv2", "opencv-python"),
    ("sklearn", "scikit-learn"),
    ("skimage", "scikit-image"),
    ("yaml", "PyYAML"),
    ("bs4", "beautifulsoup4"),
    ("Crypto", "pycryptodome"),
    ("dateutil", "python-dateutil"),
    ("dotenv", "python-dotenv"),
    ("docx", "python-docx"),
    ("pptx", "python-pptx"),
    ("fitz", "PyMuPDF"),
    ("win32api", "pywin32"),
    ("win32con", "pywin32"),
    ("win32gui", "pywin32"),
    ("pythoncom", "pywin32"),
    ("serial", "pyserial"),
    ("usb", "pyusb"),
    ("magic", "python-magic"),
    ("jwt", "PyJWT"),
    ("OpenSSL", "pyOpenSSL"),
    ("attr", "attrs"),
    ("zmq", "pyzmq"),
    ("wx", "wxPython"),
    ("gi", "PyGObject"),
    ("Levenshtein", "python-Levenshtein"),
    ("telegram", "python-telegram-bot"),
    ("discord", "discord.py"),
    ("customtkinter", "customtkinter"),
];

pub fn is_stdlib(module: &str) -> bool {
    STDLIB_MODULES.contains(&module)
}

/// Installable package name for a top-level import; unknown names pass through.
pub fn package_for_import(module: &str) -> &str {
    PACKAGE_ALIASES
        .iter()
        .find(|(import, _)| *import == module)
        .map(|(_, package)| *package)
        .unwrap_or(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdlib_detection() {
        assert!(is_stdlib("os"));
        assert!(is_stdlib("tkinter"));
        assert!(!is_stdlib("requests"));
    }

    #[test]
    fn test_aliases() {
        assert_eq!(package_for_import("PIL"), "pillow");
        assert_eq!(package_for_import("cv2"), "opencv-python");
        assert_eq!(package_for_import("requests"), "requests");
    }

    #[test]
    fn test_ambiguous_namespace_passes_through() {
        assert_eq!(package_for_import("google"), "google");
    }
}
